//! Session configuration from the environment

use crate::state_machine::EffortLevel;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
const INVOKE_PATH: &str = "/invoke";

/// Resolved once when a session starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Research service root, e.g. `http://localhost:8000`
    pub base_url: String,
    /// Whole-request timeout, streaming included
    pub request_timeout: Duration,
    /// Effort sent with submissions that don't pick one
    pub effort_level: EffortLevel,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            effort_level: EffortLevel::default(),
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; invalid values fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let base_url = lookup("RESEARCH_API_BASE_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.base_url);

        let request_timeout = match lookup("RESEARCH_REQUEST_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    tracing::warn!(
                        value = %raw,
                        "Invalid RESEARCH_REQUEST_TIMEOUT_SECS, using default"
                    );
                    defaults.request_timeout
                }
            },
            None => defaults.request_timeout,
        };

        let effort_level = match lookup("RESEARCH_EFFORT_LEVEL") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Invalid RESEARCH_EFFORT_LEVEL, using default");
                defaults.effort_level
            }),
            None => defaults.effort_level,
        };

        Self {
            base_url,
            request_timeout,
            effort_level,
        }
    }

    /// Full URL of the invoke endpoint
    pub fn endpoint(&self) -> String {
        format!("{}{INVOKE_PATH}", self.base_url.trim_end_matches('/'))
    }
}
