use crate::error::SignalError;
use crate::utils::MAX_DISPLAY_NAME_LEN;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Human-readable name bound to a connection when it creates or joins a room.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct DisplayName(String);

impl DisplayName {
    pub fn parse(raw: &str) -> Result<Self, SignalError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SignalError::invalid("Username is required."));
        }
        if trimmed.chars().count() > MAX_DISPLAY_NAME_LEN {
            return Err(SignalError::invalid(format!(
                "Username must be at most {MAX_DISPLAY_NAME_LEN} characters."
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Placeholder for a sender whose identity is not registered.
    pub fn unknown() -> Self {
        Self("Unknown User".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
