//! Streaming reducers: fold response fragments into message content

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReduceError {
    #[error("Malformed fragment: {0}")]
    Malformed(String),
    #[error("Reducer output does not extend the current content")]
    NotAppendOnly,
}

/// Combines the content so far with one fragment.
///
/// Output must extend `current`; the runtime stores only the appended part.
pub trait StreamReducer: Send + Sync {
    fn reduce(&self, current: &str, fragment: &str) -> Result<String, ReduceError>;
}

/// Plain text concatenation
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcatReducer;

impl StreamReducer for ConcatReducer {
    fn reduce(&self, current: &str, fragment: &str) -> Result<String, ReduceError> {
        let mut next = String::with_capacity(current.len() + fragment.len());
        next.push_str(current);
        next.push_str(fragment);
        Ok(next)
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum DeltaEvent {
    TextDelta { delta: String },
    #[serde(other)]
    Other,
}

/// Fragments are JSON events; only `text-delta` events add content
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDeltaReducer;

impl StreamReducer for JsonDeltaReducer {
    fn reduce(&self, current: &str, fragment: &str) -> Result<String, ReduceError> {
        let event: DeltaEvent =
            serde_json::from_str(fragment).map_err(|e| ReduceError::Malformed(e.to_string()))?;
        match event {
            DeltaEvent::TextDelta { delta } => ConcatReducer.reduce(current, &delta),
            DeltaEvent::Other => Ok(current.to_string()),
        }
    }
}

/// The part of `reduced` that follows `current`
pub fn appended_delta<'a>(current: &str, reduced: &'a str) -> Result<&'a str, ReduceError> {
    reduced
        .strip_prefix(current)
        .ok_or(ReduceError::NotAppendOnly)
}
