//! Transport error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transport failure with classification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn status(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Status, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Auth, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::RateLimit, message)
    }

    pub fn service(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Service, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Malformed, message)
    }

    pub fn not_append_only(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::NotAppendOnly, message)
    }

    /// Classify a non-success HTTP response
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let body = body.trim();
        let detail = if body.is_empty() {
            status.to_string()
        } else {
            format!("{status}: {body}")
        };
        match status.as_u16() {
            401 | 403 => Self::auth(format!("Authentication failed ({detail})")),
            429 => Self::rate_limit(format!("Rate limited ({detail})")),
            _ => Self::status(format!("Request failed ({detail})")),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::timeout(format!("Request timed out: {e}"))
        } else {
            Self::network(format!("Network error: {e}"))
        }
    }
}

/// Error classification, carried into the `Failed` lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// Connection refused, reset, or body read failure
    Network,
    /// Request exceeded the configured timeout
    Timeout,
    /// Non-success HTTP status
    Status,
    /// 401 / 403
    Auth,
    /// 429
    RateLimit,
    /// The service reported an error part in the stream
    Service,
    /// A stream line could not be decoded
    Malformed,
    /// The reducer produced content that does not extend the current text
    NotAppendOnly,
}
