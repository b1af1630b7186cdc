//! Effects produced by state transitions

use crate::state_machine::state::{Exchange, RequestOptions};
use crate::store::{MessageId, Role};
use crate::transport::TransportError;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Add a message to the store
    AppendMessage {
        id: MessageId,
        role: Role,
        content: String,
        complete: bool,
    },

    /// Open a transport stream for the exchange with the current history
    OpenStream {
        exchange: Exchange,
        options: RequestOptions,
    },

    /// Run a fragment through the reducer into the exchange's message
    ApplyFragment {
        exchange: Exchange,
        fragment: String,
    },

    /// Explain a stream failure in the message. The wording depends on
    /// whether the message has any content yet.
    AppendFailureNotice {
        message_id: MessageId,
        error: TransportError,
    },

    /// Finalize a message
    MarkComplete { message_id: MessageId },

    /// Drop the cancellation handle of the open stream, aborting it
    ReleaseStream,

    /// Discard the whole transcript
    ClearMessages,
}

impl Effect {
    pub fn append_user_message(id: MessageId, content: impl Into<String>) -> Self {
        Effect::AppendMessage {
            id,
            role: Role::User,
            content: content.into(),
            complete: true,
        }
    }

    pub fn append_pending_assistant(id: MessageId) -> Self {
        Effect::AppendMessage {
            id,
            role: Role::Assistant,
            content: String::new(),
            complete: false,
        }
    }

    pub fn mark_complete(message_id: MessageId) -> Self {
        Effect::MarkComplete { message_id }
    }
}
