use crate::error::ClientError;
use crate::peer::{ConnectionState, PeerConnection, SdpType};
use duet_core::utils::CHAT_CHANNEL_LABEL;
use duet_core::{ChatFrame, ClientMessage, ConnectionId, IceCandidate, SignalError};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Remote candidates held while no remote description exists.
pub const CANDIDATE_BUFFER_LIMIT: usize = 64;

/// Fixed by join order: whoever was in the room first offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    HaveLocalOffer,
    HaveRemoteOffer,
    Stable,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataChannelState {
    None,
    Connecting,
    Open,
    Closed,
}

/// Negotiation and data-channel state towards one remote connection.
pub struct PeerSession {
    peer_id: ConnectionId,
    role: Role,
    epoch: u64,
    negotiation: NegotiationState,
    connection: ConnectionState,
    data_channel: DataChannelState,
    remote_description_set: bool,
    pending_candidates: Vec<IceCandidate>,
    pc: Arc<dyn PeerConnection>,
}

impl PeerSession {
    fn new(peer_id: ConnectionId, role: Role, epoch: u64, pc: Arc<dyn PeerConnection>) -> Self {
        Self {
            peer_id,
            role,
            epoch,
            negotiation: NegotiationState::Idle,
            connection: ConnectionState::New,
            data_channel: DataChannelState::None,
            remote_description_set: false,
            pending_candidates: Vec::new(),
            pc,
        }
    }

    /// Opens the chat channel, creates an offer and sets it as the local
    /// description. Returns the session and the offer to relay.
    pub async fn start_as_initiator(
        peer_id: ConnectionId,
        epoch: u64,
        pc: Arc<dyn PeerConnection>,
    ) -> Result<(Self, ClientMessage), ClientError> {
        let mut session = Self::new(peer_id, Role::Initiator, epoch, pc);

        session.pc.create_data_channel(CHAT_CHANNEL_LABEL).await?;
        session.data_channel = DataChannelState::Connecting;

        let sdp = session.pc.create_offer().await?;
        session
            .pc
            .set_local_description(SdpType::Offer, sdp.clone())
            .await?;
        session.negotiation = NegotiationState::HaveLocalOffer;
        session.connection = ConnectionState::Connecting;

        info!(peer = %peer_id, epoch, "Sending offer");
        Ok((
            session,
            ClientMessage::Offer {
                sdp,
                target_id: peer_id,
            },
        ))
    }

    /// Applies a remote offer, then answers it. `early_candidates` are ones
    /// that arrived before the offer did.
    pub async fn accept_offer(
        peer_id: ConnectionId,
        epoch: u64,
        pc: Arc<dyn PeerConnection>,
        sdp: String,
        early_candidates: Vec<IceCandidate>,
    ) -> Result<(Self, ClientMessage), ClientError> {
        let mut session = Self::new(peer_id, Role::Responder, epoch, pc);
        session.pending_candidates = early_candidates;

        session
            .pc
            .set_remote_description(SdpType::Offer, sdp)
            .await?;
        session.negotiation = NegotiationState::HaveRemoteOffer;
        session.remote_description_set = true;
        session.flush_candidates().await;

        let answer = session.pc.create_answer().await?;
        session
            .pc
            .set_local_description(SdpType::Answer, answer.clone())
            .await?;
        session.negotiation = NegotiationState::Stable;
        session.connection = ConnectionState::Connecting;

        info!(peer = %peer_id, epoch, "Sending answer");
        Ok((
            session,
            ClientMessage::Answer {
                sdp: answer,
                target_id: peer_id,
            },
        ))
    }

    /// Only valid in `HaveLocalOffer`. A repeated answer once stable is ignored.
    pub async fn apply_answer(&mut self, sdp: String) -> Result<(), ClientError> {
        match (self.role, self.negotiation) {
            (Role::Initiator, NegotiationState::HaveLocalOffer) => {}
            (Role::Initiator, NegotiationState::Stable) => {
                debug!(peer = %self.peer_id, "duplicate answer ignored");
                return Ok(());
            }
            _ => return Err(SignalError::NegotiationMismatch(self.peer_id).into()),
        }

        self.pc.set_remote_description(SdpType::Answer, sdp).await?;
        self.remote_description_set = true;
        self.negotiation = NegotiationState::Stable;
        self.flush_candidates().await;
        Ok(())
    }

    /// Applies now, or holds the candidate until a remote description exists.
    pub async fn add_remote_candidate(&mut self, candidate: IceCandidate) {
        if self.negotiation == NegotiationState::Closed {
            return;
        }
        if !self.remote_description_set {
            if self.pending_candidates.len() >= CANDIDATE_BUFFER_LIMIT {
                warn!(peer = %self.peer_id, "Candidate buffer full, dropping candidate");
                return;
            }
            debug!(peer = %self.peer_id, buffered = self.pending_candidates.len() + 1, "buffering candidate");
            self.pending_candidates.push(candidate);
            return;
        }
        self.apply_candidate(candidate).await;
    }

    async fn flush_candidates(&mut self) {
        let pending = std::mem::take(&mut self.pending_candidates);
        if !pending.is_empty() {
            debug!(peer = %self.peer_id, count = pending.len(), "applying buffered candidates");
        }
        for candidate in pending {
            self.apply_candidate(candidate).await;
        }
    }

    async fn apply_candidate(&self, candidate: IceCandidate) {
        if let Err(e) = self.pc.add_ice_candidate(candidate).await {
            warn!(peer = %self.peer_id, "Failed to add ICE candidate: {:?}", e);
        }
    }

    pub fn set_connection_state(&mut self, state: ConnectionState) {
        if self.connection != ConnectionState::Closed {
            self.connection = state;
        }
    }

    pub fn on_data_channel_open(&mut self) {
        self.data_channel = DataChannelState::Open;
    }

    pub fn on_data_channel_closed(&mut self) {
        self.data_channel = DataChannelState::Closed;
    }

    /// Sends a frame when the data channel is open. Returns whether it went out.
    pub async fn send_frame(&self, frame: &ChatFrame) -> bool {
        if self.data_channel != DataChannelState::Open {
            return false;
        }
        let text = match serde_json::to_string(frame) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode data channel frame: {}", e);
                return false;
            }
        };
        match self.pc.send_text(text).await {
            Ok(()) => true,
            Err(e) => {
                warn!(peer = %self.peer_id, "Data channel send failed: {:?}", e);
                false
            }
        }
    }

    pub async fn close(&mut self) {
        if self.negotiation == NegotiationState::Closed {
            return;
        }
        self.negotiation = NegotiationState::Closed;
        self.connection = ConnectionState::Closed;
        self.data_channel = DataChannelState::Closed;
        self.pending_candidates.clear();

        if let Err(e) = self.pc.close().await {
            warn!(peer = %self.peer_id, "Error closing peer connection: {:?}", e);
        }
        info!(peer = %self.peer_id, epoch = self.epoch, "Peer session closed");
    }

    pub fn peer_id(&self) -> ConnectionId {
        self.peer_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn negotiation_state(&self) -> NegotiationState {
        self.negotiation
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection
    }

    pub fn data_channel_state(&self) -> DataChannelState {
        self.data_channel
    }

    pub fn pending_candidate_count(&self) -> usize {
        self.pending_candidates.len()
    }
}
