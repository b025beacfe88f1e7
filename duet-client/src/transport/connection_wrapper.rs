use crate::peer::{
    ConnectionState, PeerConnection, PeerConnectionFactory, PeerEvent, PeerEventKind, SdpType,
    TrackKind,
};
use crate::transport::transport_config::TransportConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use duet_core::utils::CHAT_CHANNEL_LABEL;
use duet_core::{ConnectionId, IceCandidate, IceServerConfig};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::{RTCRtpTransceiver, RTCRtpTransceiverInit};
use webrtc::track::track_remote::TrackRemote;

type ChannelSlot = Arc<Mutex<Option<Arc<RTCDataChannel>>>>;

/// Native peer connection backed by the `webrtc` crate.
pub struct WebRtcConnection {
    peer_id: ConnectionId,
    peer_connection: Arc<RTCPeerConnection>,
    data_channel: ChannelSlot,
    events: EventSink,
}

/// Stamps every backend event with the session it belongs to.
#[derive(Clone)]
struct EventSink {
    peer_id: ConnectionId,
    epoch: u64,
    tx: mpsc::UnboundedSender<PeerEvent>,
}

impl EventSink {
    fn emit(&self, kind: PeerEventKind) {
        let _ = self.tx.send(PeerEvent {
            peer_id: self.peer_id,
            epoch: self.epoch,
            kind,
        });
    }
}

impl WebRtcConnection {
    pub async fn new(
        peer_id: ConnectionId,
        epoch: u64,
        config: TransportConfig,
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let peer_connection = Arc::new(api.new_peer_connection(config.rtc_configuration()).await?);

        // Receive whatever the browser side sends.
        for kind in [RTPCodecType::Audio, RTPCodecType::Video] {
            peer_connection
                .add_transceiver_from_kind(
                    kind,
                    Some(RTCRtpTransceiverInit {
                        direction: RTCRtpTransceiverDirection::Recvonly,
                        send_encodings: vec![],
                    }),
                )
                .await?;
        }

        let sender = EventSink {
            peer_id,
            epoch,
            tx: events,
        };
        let data_channel: ChannelSlot = Arc::new(Mutex::new(None));

        let state_tx = sender.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                Box::pin(async move {
                    info!(peer = %tx.peer_id, "Peer connection state changed: {:?}", s);
                    if let Some(state) = map_state(s) {
                        tx.emit(PeerEventKind::ConnectionState(state));
                    }
                })
            },
        ));

        let ice_tx = sender.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                tx.emit(PeerEventKind::LocalCandidate(IceCandidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                }));
            })
        }));

        // Responder side: adopt the channel the initiator opened.
        let dc_tx = sender.clone();
        let dc_slot = data_channel.clone();
        peer_connection.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let tx = dc_tx.clone();
            let slot = dc_slot.clone();
            Box::pin(async move {
                debug!(peer = %tx.peer_id, "Incoming data channel '{}'", dc.label());
                if dc.label() != CHAT_CHANNEL_LABEL {
                    return;
                }
                wire_data_channel(&dc, &tx);
                *slot.lock().await = Some(dc);
            })
        }));

        let track_tx = sender.clone();
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let tx = track_tx.clone();
                Box::pin(async move {
                    let kind = match track.kind() {
                        RTPCodecType::Audio => TrackKind::Audio,
                        RTPCodecType::Video => TrackKind::Video,
                        _ => return,
                    };
                    tx.emit(PeerEventKind::RemoteTrack(kind));
                })
            },
        ));

        Ok(Self {
            peer_id,
            peer_connection,
            data_channel,
            events: sender,
        })
    }

    fn description(kind: SdpType, sdp: String) -> Result<RTCSessionDescription> {
        let desc = match kind {
            SdpType::Offer => RTCSessionDescription::offer(sdp)?,
            SdpType::Answer => RTCSessionDescription::answer(sdp)?,
        };
        Ok(desc)
    }
}

fn wire_data_channel(dc: &Arc<RTCDataChannel>, tx: &EventSink) {
    let open_tx = tx.clone();
    let label = dc.label().to_string();
    dc.on_open(Box::new(move || {
        let tx = open_tx.clone();
        let label = label.clone();
        Box::pin(async move {
            info!(peer = %tx.peer_id, "Data channel open");
            tx.emit(PeerEventKind::DataChannelOpen { label });
        })
    }));

    let msg_tx = tx.clone();
    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let tx = msg_tx.clone();
        Box::pin(async move {
            let data: Bytes = msg.data;
            match String::from_utf8(data.to_vec()) {
                Ok(text) => tx.emit(PeerEventKind::DataChannelMessage(text)),
                Err(_) => warn!(peer = %tx.peer_id, "Dropping non-text data channel frame"),
            }
        })
    }));

    let close_tx = tx.clone();
    dc.on_close(Box::new(move || {
        let tx = close_tx.clone();
        Box::pin(async move {
            tx.emit(PeerEventKind::DataChannelClosed);
        })
    }));
}

fn map_state(state: RTCPeerConnectionState) -> Option<ConnectionState> {
    match state {
        RTCPeerConnectionState::New => Some(ConnectionState::New),
        RTCPeerConnectionState::Connecting => Some(ConnectionState::Connecting),
        RTCPeerConnectionState::Connected => Some(ConnectionState::Connected),
        RTCPeerConnectionState::Disconnected => Some(ConnectionState::Disconnected),
        RTCPeerConnectionState::Failed => Some(ConnectionState::Failed),
        RTCPeerConnectionState::Closed => Some(ConnectionState::Closed),
        RTCPeerConnectionState::Unspecified => None,
    }
}

#[async_trait]
impl PeerConnection for WebRtcConnection {
    async fn create_offer(&self) -> Result<String> {
        let offer = self.peer_connection.create_offer(None).await?;
        Ok(offer.sdp)
    }

    async fn create_answer(&self) -> Result<String> {
        let answer = self.peer_connection.create_answer(None).await?;
        Ok(answer.sdp)
    }

    async fn set_local_description(&self, kind: SdpType, sdp: String) -> Result<()> {
        let desc = Self::description(kind, sdp)?;
        self.peer_connection.set_local_description(desc).await?;
        Ok(())
    }

    async fn set_remote_description(&self, kind: SdpType, sdp: String) -> Result<()> {
        let desc = Self::description(kind, sdp)?;
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            ..Default::default()
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .context("Failed to add ICE candidate")?;
        Ok(())
    }

    async fn create_data_channel(&self, label: &str) -> Result<()> {
        let dc = self.peer_connection.create_data_channel(label, None).await?;
        wire_data_channel(&dc, &self.events);
        *self.data_channel.lock().await = Some(dc);
        Ok(())
    }

    async fn send_text(&self, text: String) -> Result<()> {
        let dc = self
            .data_channel
            .lock()
            .await
            .clone()
            .context("No data channel")?;
        dc.send_text(text).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        debug!(peer = %self.peer_id, "Closing peer connection");
        if let Some(dc) = self.data_channel.lock().await.take() {
            let _ = dc.close().await;
        }
        self.peer_connection.close().await?;
        Ok(())
    }
}

/// Builds [`WebRtcConnection`]s configured from the server's ICE servers.
#[derive(Default)]
pub struct WebRtcFactory;

#[async_trait]
impl PeerConnectionFactory for WebRtcFactory {
    async fn create(
        &self,
        ice_servers: &[IceServerConfig],
        peer_id: ConnectionId,
        epoch: u64,
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> Result<Arc<dyn PeerConnection>> {
        let config = TransportConfig {
            ice_servers: ice_servers.to_vec(),
        };
        let connection = WebRtcConnection::new(peer_id, epoch, config, events).await?;
        Ok(Arc::new(connection))
    }
}
