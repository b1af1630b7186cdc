//! Pure state transition function
//!
//! Given the same state and event this always yields the same new state and
//! effects; all I/O happens in the runtime that executes the effects.

use super::state::{Exchange, LifecycleState};
use super::{Effect, Event};
use crate::transport::TransportError;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: LifecycleState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: LifecycleState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    /// Leave the state untouched and do nothing
    pub fn unchanged(state: &LifecycleState) -> Self {
        Self::new(state.clone())
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Submissions rejected before any side effect
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Message is empty")]
    InvalidInput,
    #[error("A response is still streaming (cancel it first)")]
    Busy,
}

/// Pure transition function
pub fn transition(
    state: &LifecycleState,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Submission
        // ============================================================

        // Empty input is rejected in every state
        (_, Event::Submit { text, .. }) if text.trim().is_empty() => {
            Err(TransitionError::InvalidInput)
        }

        // One stream at a time
        (
            LifecycleState::AwaitingFirstToken { .. } | LifecycleState::Streaming { .. },
            Event::Submit { .. },
        ) => Err(TransitionError::Busy),

        // Idle / Cancelled / Failed + Submit -> AwaitingFirstToken
        (
            LifecycleState::Idle | LifecycleState::Cancelled | LifecycleState::Failed { .. },
            Event::Submit {
                text,
                options,
                exchange_id,
                user_message_id,
                assistant_message_id,
            },
        ) => {
            let exchange = Exchange {
                id: exchange_id,
                assistant_message_id: assistant_message_id.clone(),
            };
            Ok(TransitionResult::new(LifecycleState::AwaitingFirstToken {
                exchange: exchange.clone(),
            })
            .with_effect(Effect::append_user_message(user_message_id, text.trim()))
            .with_effect(Effect::append_pending_assistant(assistant_message_id))
            .with_effect(Effect::OpenStream { exchange, options }))
        }

        // ============================================================
        // Cancellation
        // ============================================================

        // Nothing in flight: no-op, which also makes repeated cancels idempotent
        (
            LifecycleState::Idle | LifecycleState::Cancelled | LifecycleState::Failed { .. },
            Event::Cancel,
        ) => Ok(TransitionResult::unchanged(state)),

        // In flight + Cancel -> Cancelled, keeping partial content
        (
            LifecycleState::AwaitingFirstToken { exchange }
            | LifecycleState::Streaming { exchange },
            Event::Cancel,
        ) => Ok(TransitionResult::new(LifecycleState::Cancelled)
            .with_effect(Effect::ReleaseStream)
            .with_effect(Effect::mark_complete(exchange.assistant_message_id.clone()))),

        // ============================================================
        // Reset
        // ============================================================
        (_, Event::Reset) => {
            let mut result = TransitionResult::new(LifecycleState::Idle);
            if state.is_busy() {
                result = result.with_effect(Effect::ReleaseStream);
            }
            Ok(result.with_effect(Effect::ClearMessages))
        }

        // ============================================================
        // Transport events for the current exchange
        // ============================================================

        // First fragment -> Streaming
        (
            LifecycleState::AwaitingFirstToken { exchange }
            | LifecycleState::Streaming { exchange },
            Event::Fragment { exchange_id, text },
        ) if exchange.id == exchange_id => {
            Ok(TransitionResult::new(LifecycleState::Streaming {
                exchange: exchange.clone(),
            })
            .with_effect(Effect::ApplyFragment {
                exchange: exchange.clone(),
                fragment: text,
            }))
        }

        // Natural end -> Idle
        (
            LifecycleState::AwaitingFirstToken { exchange }
            | LifecycleState::Streaming { exchange },
            Event::StreamEnd { exchange_id },
        ) if exchange.id == exchange_id => {
            Ok(TransitionResult::new(LifecycleState::Idle)
                .with_effect(Effect::ReleaseStream)
                .with_effect(Effect::mark_complete(exchange.assistant_message_id.clone())))
        }

        // Failure -> Failed, partial content kept and annotated
        (
            LifecycleState::AwaitingFirstToken { exchange }
            | LifecycleState::Streaming { exchange },
            Event::StreamFailed { exchange_id, error },
        ) if exchange.id == exchange_id => {
            Ok(TransitionResult::new(LifecycleState::Failed {
                message: error.message.clone(),
                kind: error.kind,
            })
            .with_effect(Effect::ReleaseStream)
            .with_effect(Effect::AppendFailureNotice {
                message_id: exchange.assistant_message_id.clone(),
                error,
            })
            .with_effect(Effect::mark_complete(exchange.assistant_message_id.clone())))
        }

        // ============================================================
        // Stale transport events
        // ============================================================

        // Late events from a cancelled, failed, reset or superseded stream
        (_, Event::Fragment { .. } | Event::StreamEnd { .. } | Event::StreamFailed { .. }) => {
            Ok(TransitionResult::unchanged(state))
        }
    }
}

/// Text appended to the assistant message when its stream fails.
///
/// An empty message gets a full sentence; partial content gets a marker.
pub fn failure_notice(error: &TransportError, received_content: bool) -> String {
    if received_content {
        format!("\n\n[Response interrupted: {error}]")
    } else {
        format!("Sorry, I couldn't complete this response: {error}")
    }
}
