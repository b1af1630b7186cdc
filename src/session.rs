//! Session facade
//!
//! A `Session` is a handle to one spawned `SessionRuntime`. Calls are
//! forwarded as commands and resolve once the resulting mutation has been
//! committed and its snapshot delivered.

use crate::reducer::{ConcatReducer, StreamReducer};
use crate::runtime::{
    NoopPresenter, Presenter, SessionCommand, SessionRuntime, SessionSnapshot, Transport,
};
use crate::state_machine::{Event, LifecycleState, RequestOptions, TransitionError};
use crate::store::{Message, MessageStore};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

const COMMAND_BUFFER: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Rejected(#[from] TransitionError),
    #[error("Session has been disposed")]
    Closed,
}

/// Handle to a running chat session
pub struct Session {
    id: String,
    command_tx: mpsc::Sender<SessionCommand>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<()>,
}

impl Session {
    pub fn builder<T: Transport + 'static>(transport: T) -> SessionBuilder<T, NoopPresenter> {
        SessionBuilder {
            transport: Arc::new(transport),
            presenter: NoopPresenter,
            reducer: Arc::new(ConcatReducer),
            initial_messages: Vec::new(),
        }
    }

    /// Spawn a session with an empty transcript and the concatenating reducer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn create<T, P>(transport: T, presenter: P) -> Self
    where
        T: Transport + 'static,
        P: Presenter,
    {
        Self::builder(transport).presenter(presenter).spawn()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Submit a question.
    ///
    /// Fails with `InvalidInput` for blank text and `Busy` while a response
    /// is still in flight; neither changes the session.
    pub async fn submit(
        &self,
        text: impl Into<String>,
        options: RequestOptions,
    ) -> Result<(), SessionError> {
        self.send(Event::submit(text, options)).await
    }

    /// Stop the in-flight response, keeping what has arrived. No-op when idle.
    pub async fn cancel(&self) -> Result<(), SessionError> {
        self.send(Event::Cancel).await
    }

    /// Discard the transcript and return to `Idle`, aborting any stream
    pub async fn reset(&self) -> Result<(), SessionError> {
        self.send(Event::Reset).await
    }

    /// Latest committed snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn state(&self) -> LifecycleState {
        self.snapshot_rx.borrow().state.clone()
    }

    /// Receiver that always holds the latest snapshot
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Stop the runtime and wait for it, aborting any open stream
    pub async fn dispose(self) {
        drop(self.command_tx);
        if let Err(e) = self.task.await {
            tracing::error!(session_id = %self.id, error = %e, "Session runtime panicked");
        }
    }

    async fn send(&self, event: Event) -> Result<(), SessionError> {
        let (reply, reply_rx) = oneshot::channel();
        self.command_tx
            .send(SessionCommand { event, reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        reply_rx.await.map_err(|_| SessionError::Closed)??;
        Ok(())
    }
}

/// Configures and spawns a `Session`
pub struct SessionBuilder<T, P> {
    transport: Arc<T>,
    presenter: P,
    reducer: Arc<dyn StreamReducer>,
    initial_messages: Vec<Message>,
}

impl<T, P> SessionBuilder<T, P>
where
    T: Transport + 'static,
    P: Presenter,
{
    pub fn presenter<Q: Presenter>(self, presenter: Q) -> SessionBuilder<T, Q> {
        SessionBuilder {
            transport: self.transport,
            presenter,
            reducer: self.reducer,
            initial_messages: self.initial_messages,
        }
    }

    #[must_use]
    pub fn reducer(mut self, reducer: impl StreamReducer + 'static) -> Self {
        self.reducer = Arc::new(reducer);
        self
    }

    /// Seed the transcript. Seeded messages are treated as complete.
    #[must_use]
    pub fn initial_messages(mut self, messages: Vec<Message>) -> Self {
        self.initial_messages = messages;
        self
    }

    pub fn spawn(self) -> Session {
        let id = uuid::Uuid::new_v4().to_string();

        let messages: Vec<Message> = self
            .initial_messages
            .into_iter()
            .map(|mut m| {
                m.is_complete = true;
                m
            })
            .collect();

        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot {
            messages: messages.clone(),
            state: LifecycleState::Idle,
        });

        let runtime = SessionRuntime::new(
            id.clone(),
            MessageStore::with_messages(messages),
            self.transport,
            self.presenter,
            self.reducer,
            command_rx,
            snapshot_tx,
        );
        let task = tokio::spawn(runtime.run());

        Session {
            id,
            command_tx,
            snapshot_rx,
            task,
        }
    }
}
