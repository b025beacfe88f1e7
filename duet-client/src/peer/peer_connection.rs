use async_trait::async_trait;
use duet_core::{ConnectionId, IceCandidate, IceServerConfig};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpType {
    Offer,
    Answer,
}

/// Aggregate ICE/DTLS state as reported by the media engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionState {
    pub fn is_offline(self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed | Self::Closed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

/// Something the media engine did on its own.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEventKind {
    /// Trickle ICE: a local candidate to send to the counterpart.
    LocalCandidate(IceCandidate),
    DataChannelOpen { label: String },
    DataChannelClosed,
    DataChannelMessage(String),
    RemoteTrack(TrackKind),
    ConnectionState(ConnectionState),
}

/// A backend event, stamped with the epoch of the session that produced it.
/// Events whose epoch no longer matches a live session are stale.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerEvent {
    pub peer_id: ConnectionId,
    pub epoch: u64,
    pub kind: PeerEventKind,
}

/// The slice of a WebRTC peer connection the session protocol needs.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn create_offer(&self) -> anyhow::Result<String>;

    async fn create_answer(&self) -> anyhow::Result<String>;

    async fn set_local_description(&self, kind: SdpType, sdp: String) -> anyhow::Result<()>;

    async fn set_remote_description(&self, kind: SdpType, sdp: String) -> anyhow::Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> anyhow::Result<()>;

    /// Opens the outgoing data channel. Only the initiator calls this.
    async fn create_data_channel(&self, label: &str) -> anyhow::Result<()>;

    /// Sends on the data channel, created or adopted.
    async fn send_text(&self, text: String) -> anyhow::Result<()>;

    async fn close(&self) -> anyhow::Result<()>;
}

/// Builds one [`PeerConnection`] per session. Backend events for it must be
/// sent on `events` stamped with `peer_id` and `epoch`.
#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    async fn create(
        &self,
        ice_servers: &[IceServerConfig],
        peer_id: ConnectionId,
        epoch: u64,
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> anyhow::Result<Arc<dyn PeerConnection>>;
}
