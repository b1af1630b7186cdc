//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use super::SessionSnapshot;
use crate::state_machine::RequestOptions;
use crate::store::Message;
use crate::transport::{FragmentStream, TransportError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Opens response streams against the research service
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the transcript and return the assistant's fragments.
    ///
    /// The stream ending is the normal terminator; dropping it aborts the
    /// request.
    async fn open(
        &self,
        history: &[Message],
        options: &RequestOptions,
    ) -> Result<FragmentStream, TransportError>;
}

/// Receives a snapshot after every committed mutation
pub trait Presenter: Send + Sync + 'static {
    fn render(&self, snapshot: &SessionSnapshot);
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn open(
        &self,
        history: &[Message],
        options: &RequestOptions,
    ) -> Result<FragmentStream, TransportError> {
        (**self).open(history, options).await
    }
}

impl<P: Presenter + ?Sized> Presenter for Arc<P> {
    fn render(&self, snapshot: &SessionSnapshot) {
        (**self).render(snapshot);
    }
}

// ============================================================================
// Presenters
// ============================================================================

/// Discards snapshots (callers poll `Session::snapshot` instead)
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPresenter;

impl Presenter for NoopPresenter {
    fn render(&self, _snapshot: &SessionSnapshot) {}
}

/// Forwards each snapshot to an unbounded channel read as a `Stream`
#[derive(Debug, Clone)]
pub struct ChannelPresenter {
    tx: mpsc::UnboundedSender<SessionSnapshot>,
}

impl ChannelPresenter {
    pub fn new() -> (Self, UnboundedReceiverStream<SessionSnapshot>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, UnboundedReceiverStream::new(rx))
    }
}

impl Presenter for ChannelPresenter {
    fn render(&self, snapshot: &SessionSnapshot) {
        // Receiver gone means nobody is watching; the session keeps going
        let _ = self.tx.send(snapshot.clone());
    }
}
