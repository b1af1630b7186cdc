//! Research chat client
//!
//! A session controller for a streaming research assistant: it keeps the
//! transcript, runs one request at a time against the research service and
//! publishes immutable snapshots for a presenter to render.

pub mod config;
pub mod reducer;
pub mod runtime;
pub mod session;
pub mod state_machine;
pub mod store;
pub mod terminal;
pub mod transport;

pub use config::SessionConfig;
pub use reducer::{ConcatReducer, JsonDeltaReducer, StreamReducer};
pub use runtime::{ChannelPresenter, NoopPresenter, Presenter, SessionSnapshot, Transport};
pub use session::{Session, SessionBuilder, SessionError};
pub use state_machine::{EffortLevel, LifecycleState, RequestOptions, TransitionError};
pub use store::{Message, MessageId, Role};
pub use transport::{HttpTransport, TransportError, TransportErrorKind};
