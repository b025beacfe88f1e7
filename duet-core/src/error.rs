//! Failure taxonomy of the signaling protocol.

use crate::model::{ConnectionId, ErrorCode, RoomId, ServerMessage};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignalError {
    #[error("Room {0} already exists. Please choose another ID or join it.")]
    AlreadyExists(RoomId),

    #[error("Room {0} does not exist.")]
    NotFound(RoomId),

    #[error("Room {0} is full.")]
    Full(RoomId),

    #[error("{0}")]
    InvalidRequest(String),

    /// Relay target is gone. Logged, never reported to the sender.
    #[error("peer {0} is unreachable")]
    PeerUnreachable(ConnectionId),

    /// Answer or candidate without a matching session. Logged and dropped.
    #[error("no negotiation session for peer {0}")]
    NegotiationMismatch(ConnectionId),
}

impl SignalError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Whether the originating client is told about this failure.
    pub fn is_surfaced(&self) -> bool {
        !matches!(
            self,
            Self::PeerUnreachable(_) | Self::NegotiationMismatch(_)
        )
    }

    /// The single user-visible failure event for surfaced errors.
    pub fn to_server_message(&self) -> Option<ServerMessage> {
        match self {
            Self::NotFound(_) => Some(ServerMessage::RoomNotFound {}),
            Self::Full(_) => Some(ServerMessage::RoomFull {}),
            Self::AlreadyExists(_) => Some(ServerMessage::Error {
                code: ErrorCode::AlreadyExists,
                message: self.to_string(),
            }),
            Self::InvalidRequest(_) => Some(ServerMessage::Error {
                code: ErrorCode::InvalidRequest,
                message: self.to_string(),
            }),
            Self::PeerUnreachable(_) | Self::NegotiationMismatch(_) => None,
        }
    }
}
