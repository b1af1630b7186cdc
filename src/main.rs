//! research-chat - terminal client for the research assistant
//!
//! Reads questions from stdin and streams answers to stdout. Logs go to
//! stderr as JSON.

use futures::StreamExt;
use research_chat::terminal::{parse_input, InputCommand, TranscriptPrinter, HELP};
use research_chat::{
    ChannelPresenter, HttpTransport, RequestOptions, Session, SessionConfig, SessionError,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "research_chat=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = SessionConfig::from_env();
    tracing::info!(
        endpoint = %config.endpoint(),
        timeout_secs = config.request_timeout.as_secs(),
        effort_level = %config.effort_level,
        "Starting research chat"
    );

    let transport = HttpTransport::new(&config)?;
    let (presenter, mut snapshots) = ChannelPresenter::new();
    let session = Session::create(transport, presenter);

    let render_task = tokio::spawn(async move {
        let mut printer = TranscriptPrinter::new(std::io::stdout());
        while let Some(snapshot) = snapshots.next().await {
            if let Err(e) = printer.render(&snapshot) {
                tracing::error!(error = %e, "Failed to write transcript");
                break;
            }
        }
    });

    println!("{HELP}");
    let mut effort = config.effort_level;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let result = match parse_input(&line) {
                    InputCommand::Ask(text) => {
                        session.submit(text, RequestOptions::with_effort(effort)).await
                    }
                    InputCommand::Cancel => session.cancel().await,
                    InputCommand::Reset => session.reset().await,
                    InputCommand::Effort(level) => {
                        effort = level;
                        println!("[effort: {effort}]");
                        Ok(())
                    }
                    InputCommand::Help => {
                        println!("{HELP}");
                        Ok(())
                    }
                    InputCommand::Quit => break,
                    InputCommand::Invalid(message) => {
                        println!("[{message}]");
                        Ok(())
                    }
                };
                match result {
                    Ok(()) => {}
                    Err(SessionError::Rejected(e)) => println!("[{e}]"),
                    Err(e @ SessionError::Closed) => return Err(e.into()),
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                if session.snapshot().is_busy() {
                    session.cancel().await?;
                } else {
                    break;
                }
            }
        }
    }

    session.dispose().await;
    render_task.await?;
    tracing::info!("Research chat stopped");

    Ok(())
}
