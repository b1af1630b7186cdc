//! Events that drive the session state machine

use crate::state_machine::state::{ExchangeId, RequestOptions};
use crate::store::MessageId;
use crate::transport::TransportError;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    Submit {
        text: String,
        options: RequestOptions,
        /// Ids minted up front so the transition stays deterministic
        exchange_id: ExchangeId,
        user_message_id: MessageId,
        assistant_message_id: MessageId,
    },
    Cancel,
    Reset,

    // Transport events
    Fragment {
        exchange_id: ExchangeId,
        text: String,
    },
    StreamEnd {
        exchange_id: ExchangeId,
    },
    StreamFailed {
        exchange_id: ExchangeId,
        error: TransportError,
    },
}

impl Event {
    /// A submission with freshly minted ids
    pub fn submit(text: impl Into<String>, options: RequestOptions) -> Self {
        Event::Submit {
            text: text.into(),
            options,
            exchange_id: ExchangeId::new(),
            user_message_id: MessageId::new(),
            assistant_message_id: MessageId::new(),
        }
    }

    /// The exchange a transport event belongs to
    pub fn exchange_id(&self) -> Option<&ExchangeId> {
        match self {
            Event::Fragment { exchange_id, .. }
            | Event::StreamEnd { exchange_id }
            | Event::StreamFailed { exchange_id, .. } => Some(exchange_id),
            Event::Submit { .. } | Event::Cancel | Event::Reset => None,
        }
    }
}
