//! Session lifecycle state types

use crate::store::MessageId;
use crate::transport::TransportErrorKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Request Options
// ============================================================================

/// How much research the assistant should put into an answer.
///
/// Advisory: the service may ignore it, but it is always forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EffortLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl EffortLevel {
    pub const ALL: [EffortLevel; 3] = [EffortLevel::Low, EffortLevel::Medium, EffortLevel::High];

    pub fn as_str(self) -> &'static str {
        match self {
            EffortLevel::Low => "low",
            EffortLevel::Medium => "medium",
            EffortLevel::High => "high",
        }
    }
}

impl fmt::Display for EffortLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown effort level {0:?} (expected low, medium or high)")]
pub struct ParseEffortLevelError(String);

impl FromStr for EffortLevel {
    type Err = ParseEffortLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(EffortLevel::Low),
            "medium" => Ok(EffortLevel::Medium),
            "high" => Ok(EffortLevel::High),
            _ => Err(ParseEffortLevelError(s.to_string())),
        }
    }
}

/// Options attached to a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    pub effort_level: EffortLevel,
}

impl RequestOptions {
    pub fn with_effort(effort_level: EffortLevel) -> Self {
        Self { effort_level }
    }
}

// ============================================================================
// Exchange - one accepted submission and its response stream
// ============================================================================

/// Identifies one accepted submission. Transport events carry it so that
/// events from an earlier, abandoned stream can be told apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeId(String);

impl ExchangeId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for ExchangeId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ExchangeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The in-flight exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub id: ExchangeId,
    /// The assistant message receiving fragments
    pub assistant_message_id: MessageId,
}

// ============================================================================
// Lifecycle State
// ============================================================================

/// Phase of the current request/response exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleState {
    /// Ready for a submission
    #[default]
    Idle,

    /// Request sent, nothing received yet
    AwaitingFirstToken { exchange: Exchange },

    /// Fragments are arriving
    Streaming { exchange: Exchange },

    /// User cancelled the last exchange; accepts a new submission
    Cancelled,

    /// The last exchange failed; accepts a new submission
    Failed {
        message: String,
        kind: TransportErrorKind,
    },
}

impl LifecycleState {
    /// A stream is open (or being opened)
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            LifecycleState::AwaitingFirstToken { .. } | LifecycleState::Streaming { .. }
        )
    }

    /// The in-flight exchange, if any
    pub fn exchange(&self) -> Option<&Exchange> {
        match self {
            LifecycleState::AwaitingFirstToken { exchange }
            | LifecycleState::Streaming { exchange } => Some(exchange),
            _ => None,
        }
    }

    /// Stable name for logging
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleState::Idle => "idle",
            LifecycleState::AwaitingFirstToken { .. } => "awaiting_first_token",
            LifecycleState::Streaming { .. } => "streaming",
            LifecycleState::Cancelled => "cancelled",
            LifecycleState::Failed { .. } => "failed",
        }
    }
}
