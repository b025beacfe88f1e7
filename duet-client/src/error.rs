use duet_core::{RoomId, SignalError};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("not in a room")]
    NotInRoom,

    #[error("already in room {0}")]
    AlreadyInRoom(RoomId),

    #[error("a create or join request is already pending")]
    RequestPending,

    #[error(transparent)]
    Signal(#[from] SignalError),

    #[error("signaling channel closed")]
    ChannelClosed,

    #[error("peer connection error: {0}")]
    Backend(#[from] anyhow::Error),
}
