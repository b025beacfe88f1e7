use crate::room::ConnectionRegistry;
use duet_core::{ConnectionId, IceCandidate, ServerMessage, SignalError};
use tracing::debug;

/// Point-to-point negotiation payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayPayload {
    Offer { sdp: String },
    Answer { sdp: String },
    IceCandidate { candidate: IceCandidate },
}

impl RelayPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "ice-candidate",
        }
    }
}

/// Builds the frame `target` receives for `payload`, stamped with the
/// sender's registered identity.
///
/// The target must be connected and share the sender's room. Anything else
/// yields [`SignalError::PeerUnreachable`], which callers log and drop.
pub fn relay_frame(
    registry: &ConnectionRegistry,
    sender: ConnectionId,
    target: ConnectionId,
    payload: RelayPayload,
) -> Result<ServerMessage, SignalError> {
    let sender_room = registry.room_of(&sender);
    if sender_room.is_none() || sender_room != registry.room_of(&target) {
        return Err(SignalError::PeerUnreachable(target));
    }

    debug!(from = %sender, to = %target, kind = payload.kind(), "relay");

    let message = match payload {
        RelayPayload::Offer { sdp } => ServerMessage::Offer {
            sdp,
            sender_id: sender,
            sender_display_name: registry.display_name_or_unknown(&sender),
        },
        RelayPayload::Answer { sdp } => ServerMessage::Answer {
            sdp,
            sender_id: sender,
            sender_display_name: registry.display_name_or_unknown(&sender),
        },
        RelayPayload::IceCandidate { candidate } => ServerMessage::IceCandidate {
            candidate,
            sender_id: sender,
        },
    };
    Ok(message)
}
