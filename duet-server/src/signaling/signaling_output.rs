use async_trait::async_trait;
use duet_core::{ConnectionId, ServerMessage, SignalError};

/// Outbound side of the transport, as seen by the coordinator.
///
/// Implemented by the WebSocket layer and by test doubles.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Delivers one frame to one connection. Fails with
    /// [`SignalError::PeerUnreachable`] when the connection is gone.
    async fn deliver(
        &self,
        connection_id: &ConnectionId,
        message: ServerMessage,
    ) -> Result<(), SignalError>;
}
