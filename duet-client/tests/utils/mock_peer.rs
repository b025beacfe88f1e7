use async_trait::async_trait;
use duet_client::peer::SdpType;
use duet_client::{PeerConnection, PeerConnectionFactory, PeerEvent, PeerEventKind};
use duet_core::{ConnectionId, IceCandidate, IceServerConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Everything the controller asked a peer connection to do.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerCall {
    CreateOffer,
    CreateAnswer,
    SetLocal(SdpType, String),
    SetRemote(SdpType, String),
    AddCandidate(IceCandidate),
    CreateDataChannel(String),
    SendText(String),
    Close,
}

/// Scripted peer connection that records every call.
pub struct MockPeerConnection {
    pub peer_id: ConnectionId,
    pub epoch: u64,
    calls: Mutex<Vec<PeerCall>>,
    events: mpsc::UnboundedSender<PeerEvent>,
}

impl MockPeerConnection {
    pub fn calls(&self) -> Vec<PeerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&PeerCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    /// Index of the first call matching `pred`.
    pub fn position(&self, pred: impl Fn(&PeerCall) -> bool) -> Option<usize> {
        self.calls.lock().unwrap().iter().position(pred)
    }

    pub fn is_closed(&self) -> bool {
        self.count(|c| matches!(c, PeerCall::Close)) > 0
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                PeerCall::SendText(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    /// Reports a backend event the way the media engine would.
    pub fn emit(&self, kind: PeerEventKind) {
        let _ = self.events.send(PeerEvent {
            peer_id: self.peer_id,
            epoch: self.epoch,
            kind,
        });
    }

    fn record(&self, call: PeerCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PeerConnection for MockPeerConnection {
    async fn create_offer(&self) -> anyhow::Result<String> {
        self.record(PeerCall::CreateOffer);
        Ok(format!("offer-{}", self.epoch))
    }

    async fn create_answer(&self) -> anyhow::Result<String> {
        self.record(PeerCall::CreateAnswer);
        Ok(format!("answer-{}", self.epoch))
    }

    async fn set_local_description(&self, kind: SdpType, sdp: String) -> anyhow::Result<()> {
        self.record(PeerCall::SetLocal(kind, sdp));
        Ok(())
    }

    async fn set_remote_description(&self, kind: SdpType, sdp: String) -> anyhow::Result<()> {
        if sdp.is_empty() {
            anyhow::bail!("empty session description");
        }
        self.record(PeerCall::SetRemote(kind, sdp));
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> anyhow::Result<()> {
        self.record(PeerCall::AddCandidate(candidate));
        Ok(())
    }

    async fn create_data_channel(&self, label: &str) -> anyhow::Result<()> {
        self.record(PeerCall::CreateDataChannel(label.to_string()));
        Ok(())
    }

    async fn send_text(&self, text: String) -> anyhow::Result<()> {
        self.record(PeerCall::SendText(text));
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.record(PeerCall::Close);
        Ok(())
    }
}

/// Hands out [`MockPeerConnection`]s and keeps them for inspection.
#[derive(Default)]
pub struct MockPeerFactory {
    created: Mutex<Vec<Arc<MockPeerConnection>>>,
    fail_next: AtomicBool,
}

impl MockPeerFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    /// Most recent connection created for `peer`.
    pub fn latest_for(&self, peer: &ConnectionId) -> Option<Arc<MockPeerConnection>> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|c| c.peer_id == *peer)
            .cloned()
    }

    pub fn all_for(&self, peer: &ConnectionId) -> Vec<Arc<MockPeerConnection>> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.peer_id == *peer)
            .cloned()
            .collect()
    }

    pub fn fail_next_create(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PeerConnectionFactory for MockPeerFactory {
    async fn create(
        &self,
        _ice_servers: &[IceServerConfig],
        peer_id: ConnectionId,
        epoch: u64,
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> anyhow::Result<Arc<dyn PeerConnection>> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            anyhow::bail!("media engine unavailable");
        }
        let connection = Arc::new(MockPeerConnection {
            peer_id,
            epoch,
            calls: Mutex::new(Vec::new()),
            events,
        });
        self.created.lock().unwrap().push(connection.clone());
        Ok(connection)
    }
}
