//! Session runtime executor

use super::traits::{Presenter, Transport};
use super::{SessionCommand, SessionSnapshot};

use crate::reducer::{appended_delta, ReduceError, StreamReducer};
use crate::state_machine::{
    failure_notice, transition, Effect, Event, ExchangeId, LifecycleState, RequestOptions,
    TransitionError,
};
use crate::store::{Message, MessageStore, Role, StoreError};
use crate::transport::TransportError;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Capacity of the transport event channel; fragments wait here in order
const TRANSPORT_EVENT_BUFFER: usize = 64;

/// Runtime that owns one session's state and executes transition effects
pub struct SessionRuntime<T, P>
where
    T: Transport + 'static,
    P: Presenter,
{
    session_id: String,
    state: LifecycleState,
    store: MessageStore,
    transport: Arc<T>,
    presenter: P,
    reducer: Arc<dyn StreamReducer>,
    command_rx: mpsc::Receiver<SessionCommand>,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    /// Token of the open response stream; taken on release
    stream_cancel: Option<CancellationToken>,
}

impl<T, P> SessionRuntime<T, P>
where
    T: Transport + 'static,
    P: Presenter,
{
    pub fn new(
        session_id: String,
        store: MessageStore,
        transport: Arc<T>,
        presenter: P,
        reducer: Arc<dyn StreamReducer>,
        command_rx: mpsc::Receiver<SessionCommand>,
        snapshot_tx: watch::Sender<SessionSnapshot>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(TRANSPORT_EVENT_BUFFER);
        Self {
            session_id,
            state: LifecycleState::Idle,
            store,
            transport,
            presenter,
            reducer,
            command_rx,
            event_rx,
            event_tx,
            snapshot_tx,
            stream_cancel: None,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(session_id = %self.session_id, "Starting session runtime");

        loop {
            tokio::select! {
                command = self.command_rx.recv() => {
                    // All facade handles dropped
                    let Some(SessionCommand { event, reply }) = command else {
                        break;
                    };
                    let outcome = self.process_event(event);
                    // Caller may have stopped waiting
                    let _ = reply.send(outcome);
                }
                Some(event) = self.event_rx.recv() => {
                    // Transport events are never rejected
                    let _ = self.process_event(event);
                }
            }
        }

        self.release_stream();
        tracing::info!(session_id = %self.session_id, "Session runtime stopped");
    }

    /// Run one inbound event and everything it chains, then publish once
    fn process_event(&mut self, event: Event) -> Result<(), TransitionError> {
        let mut events_to_process = vec![event];
        let state_before = self.state.clone();
        let revision_before = self.store.revision();
        let mut outcome = Ok(());

        while let Some(current_event) = events_to_process.pop() {
            let result = match transition(&self.state, current_event) {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!(
                        session_id = %self.session_id,
                        error = %e,
                        "Submission rejected"
                    );
                    outcome = Err(e);
                    break;
                }
            };

            if result.new_state == self.state && result.effects.is_empty() {
                tracing::trace!(state = self.state.name(), "Event ignored");
                continue;
            }

            let old_state = std::mem::replace(&mut self.state, result.new_state);
            if old_state.name() != self.state.name() {
                tracing::info!(
                    session_id = %self.session_id,
                    from = old_state.name(),
                    to = self.state.name(),
                    "State transition"
                );
            }

            for effect in result.effects {
                match self.execute_effect(effect) {
                    Ok(Some(generated_event)) => events_to_process.push(generated_event),
                    Ok(None) => {}
                    Err(e) => {
                        tracing::error!(
                            session_id = %self.session_id,
                            error = %e,
                            "Message store invariant violated"
                        );
                    }
                }
            }
        }

        // Effects that turned out to be no-ops (clearing an empty
        // transcript) commit nothing
        if self.state != state_before || self.store.revision() != revision_before {
            self.publish();
        }
        outcome
    }

    /// Execute an effect and optionally return a generated event
    fn execute_effect(&mut self, effect: Effect) -> Result<Option<Event>, StoreError> {
        match effect {
            Effect::AppendMessage {
                id,
                role,
                content,
                complete,
            } => {
                let message = match (role, complete) {
                    (Role::User, _) => Message::user(id, content),
                    (Role::Assistant, true) => Message::assistant(id, content),
                    (Role::Assistant, false) => {
                        let mut message = Message::pending_assistant(id);
                        message.content = content;
                        message
                    }
                };
                self.store.append(message);
                Ok(None)
            }

            Effect::OpenStream { exchange, options } => {
                let history: Vec<Message> = self
                    .store
                    .iter()
                    .filter(|m| m.id != exchange.assistant_message_id)
                    .cloned()
                    .collect();
                self.spawn_stream(exchange.id, history, options);
                Ok(None)
            }

            Effect::ApplyFragment { exchange, fragment } => {
                let message_id = &exchange.assistant_message_id;
                let current = self
                    .store
                    .get(message_id)
                    .ok_or_else(|| StoreError::NotFound(message_id.clone()))?
                    .content
                    .clone();

                let reduced = self
                    .reducer
                    .reduce(&current, &fragment)
                    .and_then(|next| appended_delta(&current, &next).map(str::to_string));

                match reduced {
                    Ok(delta) => {
                        self.store.update_content(message_id, &delta)?;
                        Ok(None)
                    }
                    Err(e) => {
                        let error = match e {
                            ReduceError::Malformed(message) => TransportError::malformed(message),
                            other @ ReduceError::NotAppendOnly => {
                                TransportError::not_append_only(other.to_string())
                            }
                        };
                        tracing::warn!(
                            exchange_id = %exchange.id,
                            error = %error,
                            "Fragment rejected by reducer"
                        );
                        Ok(Some(Event::StreamFailed {
                            exchange_id: exchange.id,
                            error,
                        }))
                    }
                }
            }

            Effect::AppendFailureNotice { message_id, error } => {
                let received_content = !self
                    .store
                    .get(&message_id)
                    .ok_or_else(|| StoreError::NotFound(message_id.clone()))?
                    .content
                    .is_empty();
                self.store
                    .update_content(&message_id, &failure_notice(&error, received_content))?;
                Ok(None)
            }

            Effect::MarkComplete { message_id } => {
                self.store.mark_complete(&message_id)?;
                Ok(None)
            }

            Effect::ReleaseStream => {
                self.release_stream();
                Ok(None)
            }

            Effect::ClearMessages => {
                tracing::info!(
                    session_id = %self.session_id,
                    cleared = self.store.len(),
                    "Transcript cleared"
                );
                self.store.clear();
                Ok(None)
            }
        }
    }

    /// Open the transport stream in a background task that forwards its
    /// items as events tagged with the exchange id
    fn spawn_stream(
        &mut self,
        exchange_id: ExchangeId,
        history: Vec<Message>,
        options: RequestOptions,
    ) {
        // Only one stream may be open
        self.release_stream();

        let cancel_token = CancellationToken::new();
        self.stream_cancel = Some(cancel_token.clone());

        let transport = self.transport.clone();
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            tracing::info!(
                exchange_id = %exchange_id,
                messages = history.len(),
                effort_level = %options.effort_level,
                "Opening response stream (background)"
            );

            // Race opening against cancellation
            let opened = tokio::select! {
                biased;

                () = cancel_token.cancelled() => {
                    tracing::info!(exchange_id = %exchange_id, "Stream cancelled before opening");
                    return;
                }

                result = transport.open(&history, &options) => result,
            };

            let mut stream = match opened {
                Ok(stream) => stream,
                Err(error) => {
                    tracing::warn!(
                        exchange_id = %exchange_id,
                        kind = ?error.kind,
                        error = %error,
                        "Failed to open response stream"
                    );
                    let _ = event_tx.send(Event::StreamFailed { exchange_id, error }).await;
                    return;
                }
            };

            let mut fragments = 0usize;
            loop {
                let item = tokio::select! {
                    biased;

                    () = cancel_token.cancelled() => {
                        tracing::info!(
                            exchange_id = %exchange_id,
                            fragments,
                            "Response stream aborted"
                        );
                        return;
                    }

                    item = stream.next() => item,
                };

                let event = match item {
                    Some(Ok(text)) => {
                        fragments += 1;
                        Event::Fragment {
                            exchange_id: exchange_id.clone(),
                            text,
                        }
                    }
                    Some(Err(error)) => {
                        tracing::warn!(
                            exchange_id = %exchange_id,
                            kind = ?error.kind,
                            error = %error,
                            "Response stream failed"
                        );
                        let _ = event_tx.send(Event::StreamFailed { exchange_id, error }).await;
                        return;
                    }
                    None => {
                        tracing::info!(
                            exchange_id = %exchange_id,
                            fragments,
                            "Response stream finished"
                        );
                        let _ = event_tx.send(Event::StreamEnd { exchange_id }).await;
                        return;
                    }
                };

                if event_tx.send(event).await.is_err() {
                    // Runtime is gone
                    return;
                }
            }
        });
    }

    /// Abort the open stream, if any. Releasing twice is a no-op.
    fn release_stream(&mut self) {
        if let Some(token) = self.stream_cancel.take() {
            token.cancel();
            tracing::debug!(session_id = %self.session_id, "Released response stream");
        }
    }

    fn publish(&self) {
        let snapshot = SessionSnapshot {
            messages: self.store.snapshot(),
            state: self.state.clone(),
        };
        self.presenter.render(&snapshot);
        self.snapshot_tx.send_replace(snapshot);
    }
}
