use crate::error::SignalError;
use crate::utils::{GENERATED_ROOM_ID_LEN, MAX_ROOM_ID_LEN};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Name of a rendezvous point. Either chosen by the creator or generated.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct RoomId(String);

impl RoomId {
    /// Validates a client-supplied identifier.
    pub fn parse(raw: &str) -> Result<Self, SignalError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SignalError::invalid("Room ID is required."));
        }
        if trimmed.chars().count() > MAX_ROOM_ID_LEN {
            return Err(SignalError::invalid(format!(
                "Room ID must be at most {MAX_ROOM_ID_LEN} characters."
            )));
        }
        if trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(SignalError::invalid(
                "Room ID must not contain whitespace.",
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Short lowercase alphanumeric identifier for rooms created without one.
    pub fn generate() -> Self {
        let simple = Uuid::new_v4().simple().to_string();
        Self(simple[..GENERATED_ROOM_ID_LEN].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
