//! Request lifecycle state machine
//!
//! Elm-style: `transition` is pure and returns the effects the session
//! runtime must execute.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{
    EffortLevel, Exchange, ExchangeId, LifecycleState, ParseEffortLevelError, RequestOptions,
};
pub use transition::{failure_notice, transition, TransitionError, TransitionResult};
