//! Conversation message log
//!
//! Ordered, append-only record of the turns in one session. Content of a
//! message only ever grows, so renderers can diff by length.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Unique identifier of a message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One turn of the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub is_complete: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// A finished user turn
    pub fn user(id: MessageId, content: impl Into<String>) -> Self {
        Self {
            id,
            role: Role::User,
            content: content.into(),
            is_complete: true,
            created_at: Utc::now(),
        }
    }

    /// An empty assistant turn waiting for fragments
    pub fn pending_assistant(id: MessageId) -> Self {
        Self {
            id,
            role: Role::Assistant,
            content: String::new(),
            is_complete: false,
            created_at: Utc::now(),
        }
    }

    /// A finished assistant turn, used when seeding a transcript
    pub fn assistant(id: MessageId, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_complete: true,
            ..Self::pending_assistant(id)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Unknown id, or the message was already finalized
    #[error("Message not found or already complete: {0}")]
    NotFound(MessageId),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Append-only message log owned by the session runtime
#[derive(Debug, Default, Clone)]
pub struct MessageStore {
    messages: Vec<Message>,
    /// Bumped by every mutation that changes the transcript
    revision: u64,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            revision: 0,
        }
    }

    /// Append a message, returning its id
    pub fn append(&mut self, message: Message) -> MessageId {
        let id = message.id.clone();
        self.messages.push(message);
        self.revision += 1;
        id
    }

    /// Append `delta` to an incomplete message
    pub fn update_content(&mut self, id: &MessageId, delta: &str) -> StoreResult<()> {
        let message = self
            .messages
            .iter_mut()
            .find(|m| &m.id == id && !m.is_complete)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if !delta.is_empty() {
            message.content.push_str(delta);
            self.revision += 1;
        }
        Ok(())
    }

    /// Finalize a message. Finalizing twice is harmless.
    pub fn mark_complete(&mut self, id: &MessageId) -> StoreResult<()> {
        let message = self
            .messages
            .iter_mut()
            .find(|m| &m.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if !message.is_complete {
            message.is_complete = true;
            self.revision += 1;
        }
        Ok(())
    }

    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// Owned copy of the transcript in conversation order
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        if !self.messages.is_empty() {
            self.messages.clear();
            self.revision += 1;
        }
    }

    /// Changes whenever the transcript does; equal revisions mean equal
    /// transcripts
    pub fn revision(&self) -> u64 {
        self.revision
    }
}
