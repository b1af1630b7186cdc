//! Session runtime
//!
//! One task per session owns the lifecycle state and the message store.
//! Commands from the facade and events from the transport task are the only
//! inputs; every committed mutation is published as one `SessionSnapshot`.

mod executor;
pub mod traits;


pub use executor::SessionRuntime;
pub use traits::*;

use crate::state_machine::{Event, LifecycleState, TransitionError};
use crate::store::{Message, Role};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Immutable view of a session handed to presenters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub messages: Vec<Message>,
    pub state: LifecycleState,
}

impl SessionSnapshot {
    pub fn is_busy(&self) -> bool {
        self.state.is_busy()
    }

    /// The most recent assistant message, if any
    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
    }
}

/// A user event plus the channel its accept/reject outcome goes back on
#[derive(Debug)]
pub struct SessionCommand {
    pub event: Event,
    pub reply: oneshot::Sender<Result<(), TransitionError>>,
}
