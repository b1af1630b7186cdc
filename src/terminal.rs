//! Line-oriented terminal presentation
//!
//! Message content only ever grows, so the printer writes the suffix it has
//! not printed yet instead of redrawing.

use crate::runtime::SessionSnapshot;
use crate::state_machine::{EffortLevel, LifecycleState};
use crate::store::{Message, MessageId, Role};
use std::io::{self, Write};

struct Printed {
    id: MessageId,
    len: usize,
    complete: bool,
}

/// Writes snapshots to a terminal as an append-only transcript
pub struct TranscriptPrinter<W> {
    out: W,
    printed: Vec<Printed>,
    cancelled_shown: bool,
}

impl<W: Write> TranscriptPrinter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            printed: Vec::new(),
            cancelled_shown: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn render(&mut self, snapshot: &SessionSnapshot) -> io::Result<()> {
        let diverged = self.printed.len() > snapshot.messages.len()
            || self
                .printed
                .iter()
                .zip(&snapshot.messages)
                .any(|(p, m)| p.id != m.id);
        if diverged {
            self.printed.clear();
            writeln!(self.out, "\n[conversation cleared]")?;
        }

        for (i, message) in snapshot.messages.iter().enumerate() {
            if let Some(printed) = self.printed.get_mut(i) {
                Self::write_update(&mut self.out, printed, message)?;
            } else {
                let printed = Self::write_new(&mut self.out, message)?;
                self.printed.push(printed);
            }
        }

        match snapshot.state {
            LifecycleState::Cancelled if !self.cancelled_shown => {
                writeln!(self.out, "[cancelled]")?;
                self.cancelled_shown = true;
            }
            LifecycleState::Cancelled => {}
            _ => self.cancelled_shown = false,
        }

        self.out.flush()
    }

    fn write_new(out: &mut W, message: &Message) -> io::Result<Printed> {
        match message.role {
            Role::User => writeln!(out, "\n> {}\n", message.content)?,
            Role::Assistant => {
                write!(out, "{}", message.content)?;
                if message.is_complete {
                    writeln!(out)?;
                }
            }
        }
        Ok(Printed {
            id: message.id.clone(),
            len: message.content.len(),
            complete: message.is_complete || message.role == Role::User,
        })
    }

    fn write_update(out: &mut W, printed: &mut Printed, message: &Message) -> io::Result<()> {
        if let Some(delta) = message.content.get(printed.len..) {
            if !delta.is_empty() {
                write!(out, "{delta}")?;
            }
        }
        printed.len = message.content.len();

        if message.is_complete && !printed.complete {
            writeln!(out)?;
            printed.complete = true;
        }
        Ok(())
    }
}

/// One line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand {
    Ask(String),
    Cancel,
    Reset,
    Effort(EffortLevel),
    Help,
    Quit,
    /// Unknown command or bad argument, with a message for the user
    Invalid(String),
}

pub const HELP: &str = "\
Type a question and press enter. Commands:
  /cancel           stop the current response
  /reset            start a new conversation
  /effort <level>   low, medium or high
  /quit             exit";

pub fn parse_input(line: &str) -> InputCommand {
    let line = line.trim();
    let Some(command) = line.strip_prefix('/') else {
        return InputCommand::Ask(line.to_string());
    };

    let mut parts = command.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("cancel"), None) => InputCommand::Cancel,
        (Some("reset"), None) => InputCommand::Reset,
        (Some("help"), None) => InputCommand::Help,
        (Some("quit" | "exit"), None) => InputCommand::Quit,
        (Some("effort"), Some(level)) => match level.parse() {
            Ok(level) => InputCommand::Effort(level),
            Err(e) => InputCommand::Invalid(e.to_string()),
        },
        _ => InputCommand::Invalid(format!("Unknown command: /{command}")),
    }
}
