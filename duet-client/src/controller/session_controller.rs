use crate::controller::{ClientEvent, ControllerCommand, MediaLayout};
use crate::error::ClientError;
use crate::peer::{
    CANDIDATE_BUFFER_LIMIT, ConnectionState, DataChannelState, PeerConnectionFactory, PeerEvent,
    PeerEventKind, PeerSession, Role,
};
use duet_core::utils::CHAT_CHANNEL_LABEL;
use duet_core::{
    ChatFrame, ClientMessage, ConnectionId, DisplayName, IceCandidate, IceServerConfig, Member,
    RoomId, ServerMessage, SignalError,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Candidates held per known member whose offer has not arrived yet.
pub const EARLY_CANDIDATE_LIMIT: usize = CANDIDATE_BUFFER_LIMIT;

struct PendingRequest {
    display_name: DisplayName,
    room_id: Option<RoomId>,
}

struct ActiveRoom {
    room_id: RoomId,
    epoch: u64,
    display_name: DisplayName,
}

/// Drives peer sessions from signaling traffic and keeps the display layout
/// in step with them.
///
/// Everything runs on one task: server frames, backend events and user
/// commands are handled one at a time, so a leave can never interleave with a
/// half-applied negotiation step. Backend events from torn-down sessions are
/// recognised by their epoch and dropped.
pub struct ClientSessionController {
    factory: Arc<dyn PeerConnectionFactory>,
    outbound: mpsc::UnboundedSender<ClientMessage>,
    ui: mpsc::UnboundedSender<ClientEvent>,
    peer_events: mpsc::UnboundedSender<PeerEvent>,

    connection_id: Option<ConnectionId>,
    ice_servers: Vec<IceServerConfig>,
    room: Option<ActiveRoom>,
    pending: Option<PendingRequest>,
    members: HashMap<ConnectionId, DisplayName>,
    sessions: HashMap<ConnectionId, PeerSession>,
    early_candidates: HashMap<ConnectionId, Vec<IceCandidate>>,
    next_epoch: u64,
    layout: MediaLayout,
}

impl ClientSessionController {
    /// Returns the controller and the receiver its peer connections report on.
    pub fn new(
        factory: Arc<dyn PeerConnectionFactory>,
        outbound: mpsc::UnboundedSender<ClientMessage>,
        ui: mpsc::UnboundedSender<ClientEvent>,
    ) -> (Self, mpsc::UnboundedReceiver<PeerEvent>) {
        let (peer_events, peer_rx) = mpsc::unbounded_channel();
        let controller = Self {
            factory,
            outbound,
            ui,
            peer_events,
            connection_id: None,
            ice_servers: IceServerConfig::default_stun(),
            room: None,
            pending: None,
            members: HashMap::new(),
            sessions: HashMap::new(),
            early_candidates: HashMap::new(),
            next_epoch: 1,
            layout: MediaLayout::new(),
        };
        (controller, peer_rx)
    }

    pub async fn run(
        mut self,
        mut server_rx: mpsc::UnboundedReceiver<ServerMessage>,
        mut peer_rx: mpsc::UnboundedReceiver<PeerEvent>,
        mut commands: mpsc::UnboundedReceiver<ControllerCommand>,
    ) {
        loop {
            tokio::select! {
                msg = server_rx.recv() => match msg {
                    Some(msg) => self.handle_server_message(msg).await,
                    None => {
                        self.handle_disconnect().await;
                        break;
                    }
                },
                Some(event) = peer_rx.recv() => self.handle_peer_event(event).await,
                cmd = commands.recv() => match cmd {
                    Some(cmd) => {
                        if let Err(e) = self.execute(cmd).await {
                            warn!("Command failed: {}", e);
                            self.emit(ClientEvent::Rejected { reason: e.to_string() });
                        }
                    }
                    None => break,
                },
            }
        }

        self.teardown_all().await;
        info!("Session controller stopped");
    }

    pub async fn execute(&mut self, command: ControllerCommand) -> Result<(), ClientError> {
        match command {
            ControllerCommand::CreateRoom {
                room_id,
                display_name,
            } => self.create_room(room_id, &display_name),
            ControllerCommand::JoinRoom {
                room_id,
                display_name,
            } => self.join_room(&room_id, &display_name),
            ControllerCommand::SendChat { body, file_ref } => self.send_chat(body, file_ref).await,
            ControllerCommand::SetTyping(is_typing) => self.set_typing(is_typing).await,
            ControllerCommand::Leave => self.leave().await,
        }
    }

    // --- User commands ---

    pub fn create_room(
        &mut self,
        room_id: Option<String>,
        display_name: &str,
    ) -> Result<(), ClientError> {
        self.ensure_idle()?;
        let name = DisplayName::parse(display_name)?;
        let room_id = match room_id {
            Some(raw) if !raw.trim().is_empty() => Some(RoomId::parse(&raw)?),
            _ => None,
        };

        self.send(ClientMessage::CreateRoom {
            room_id: room_id.as_ref().map(|r| r.as_str().to_string()),
            display_name: name.as_str().to_string(),
        })?;
        self.pending = Some(PendingRequest {
            display_name: name,
            room_id,
        });
        Ok(())
    }

    pub fn join_room(&mut self, room_id: &str, display_name: &str) -> Result<(), ClientError> {
        self.ensure_idle()?;
        let name = DisplayName::parse(display_name)?;
        let room_id = RoomId::parse(room_id)?;

        self.send(ClientMessage::JoinRoom {
            room_id: room_id.as_str().to_string(),
            display_name: name.as_str().to_string(),
        })?;
        self.pending = Some(PendingRequest {
            display_name: name,
            room_id: Some(room_id),
        });
        Ok(())
    }

    /// The server copy is the one displayed and persisted; open data channels
    /// get a mirror.
    pub async fn send_chat(
        &mut self,
        body: String,
        file_ref: Option<String>,
    ) -> Result<(), ClientError> {
        let sender = self.own_name()?.as_str().to_string();
        let frame = ChatFrame::Message {
            body: body.clone(),
            file_ref: file_ref.clone(),
            sender,
        };

        self.send(ClientMessage::ChatMessage { body, file_ref })?;
        for session in self.sessions.values() {
            session.send_frame(&frame).await;
        }
        Ok(())
    }

    /// Goes peer-to-peer when a channel is open, through the server otherwise.
    pub async fn set_typing(&mut self, is_typing: bool) -> Result<(), ClientError> {
        let sender = self.own_name()?.as_str().to_string();
        let frame = ChatFrame::Typing { is_typing, sender };

        let mut delivered = false;
        for session in self.sessions.values() {
            delivered |= session.send_frame(&frame).await;
        }
        if !delivered {
            self.send(ClientMessage::Typing { is_typing })?;
        }
        Ok(())
    }

    pub async fn leave(&mut self) -> Result<(), ClientError> {
        if self.room.is_none() {
            return Err(ClientError::NotInRoom);
        }
        let sent = self.send(ClientMessage::LeaveRoom {});
        self.teardown_all().await;
        self.emit(ClientEvent::Left);
        sent
    }

    /// Signaling link lost. Everything is torn down locally; the user has to
    /// join again.
    pub async fn handle_disconnect(&mut self) {
        let was_in_room = self.room.is_some();
        self.teardown_all().await;
        self.connection_id = None;
        if was_in_room {
            self.emit(ClientEvent::Left);
        }
        info!("Signaling connection closed");
    }

    // --- Server frames ---

    pub async fn handle_server_message(&mut self, msg: ServerMessage) {
        debug!(kind = msg.kind(), "Server frame");
        match msg {
            ServerMessage::Welcome {
                connection_id,
                ice_servers,
            } => {
                info!(connection = %connection_id, "Connected to signaling server");
                self.connection_id = Some(connection_id);
                if !ice_servers.is_empty() {
                    self.ice_servers = ice_servers;
                }
                self.emit(ClientEvent::Connected { connection_id });
            }

            ServerMessage::RoomCreated { room_id, epoch } => {
                let Some(pending) = self.pending.take() else {
                    warn!(room = %room_id, "room:created without a pending request");
                    return;
                };
                let display_name = pending.display_name;
                info!(room = %room_id, epoch, "Room created");
                self.enter_room(room_id.clone(), epoch, display_name);
                self.emit(ClientEvent::RoomCreated { room_id });
            }

            ServerMessage::RoomJoined {
                room_id,
                epoch,
                display_name,
                other_members,
                chat_history,
            } => {
                self.pending = None;
                info!(room = %room_id, epoch, members = other_members.len(), "Joined room");
                self.enter_room(room_id.clone(), epoch, display_name.clone());
                for member in &other_members {
                    self.members
                        .insert(member.id, member.display_name.clone());
                }
                // Members already present initiate; we wait for their offers.
                self.emit(ClientEvent::RoomJoined {
                    room_id,
                    display_name,
                    other_members,
                    history: chat_history,
                });
            }

            ServerMessage::RoomNotFound {} => {
                let reason = self.pending_reason(SignalError::NotFound, "Room not found.");
                self.reject(reason)
            }

            ServerMessage::RoomFull {} => {
                let reason = self.pending_reason(SignalError::Full, "Room is full.");
                self.reject(reason)
            }

            ServerMessage::Error { message, .. } => self.reject(message),

            ServerMessage::UserJoined(member) => self.on_user_joined(member).await,

            ServerMessage::UserLeft(member) => self.on_user_left(member).await,

            ServerMessage::Offer {
                sdp,
                sender_id,
                sender_display_name,
            } => self.on_offer(sender_id, sender_display_name, sdp).await,

            ServerMessage::Answer { sdp, sender_id, .. } => self.on_answer(sender_id, sdp).await,

            ServerMessage::IceCandidate {
                candidate,
                sender_id,
            } => self.on_remote_candidate(sender_id, candidate).await,

            ServerMessage::ChatMessage(message) => {
                let own = Some(message.sender_id) == self.connection_id;
                self.emit(ClientEvent::ChatReceived { message, own });
            }

            ServerMessage::ChatTyping {
                display_name,
                is_typing,
                ..
            } => self.emit(ClientEvent::Typing {
                display_name: display_name.as_str().to_string(),
                is_typing,
            }),

            ServerMessage::PeerDisplayName {
                peer_id,
                display_name,
            } => {
                if let Some(name) = self.members.get_mut(&peer_id) {
                    *name = display_name.clone();
                }
                self.emit(ClientEvent::PeerIdentified {
                    peer_id,
                    display_name,
                });
            }
        }
    }

    fn enter_room(&mut self, room_id: RoomId, epoch: u64, display_name: DisplayName) {
        self.room = Some(ActiveRoom {
            room_id,
            epoch,
            display_name,
        });
        if self.layout.attach_local() {
            self.emit_layout();
        }
    }

    fn pending_reason(&self, error: fn(RoomId) -> SignalError, fallback: &str) -> String {
        match self.pending.as_ref().and_then(|p| p.room_id.clone()) {
            Some(room_id) => error(room_id).to_string(),
            None => fallback.to_string(),
        }
    }

    fn reject(&mut self, reason: String) {
        self.pending = None;
        info!("Request rejected: {}", reason);
        self.emit(ClientEvent::Rejected { reason });
    }

    async fn on_user_joined(&mut self, member: Member) {
        if self.room.is_none() || Some(member.id) == self.connection_id {
            return;
        }
        info!(peer = %member.id, name = %member.display_name, "Peer joined");
        self.members.insert(member.id, member.display_name.clone());
        self.emit(ClientEvent::PeerJoined(member.clone()));

        // A stale session under the same id cannot be resumed.
        self.teardown_peer(&member.id).await;
        self.start_initiator(member.id).await;
    }

    async fn on_user_left(&mut self, member: Member) {
        info!(peer = %member.id, name = %member.display_name, "Peer left");
        self.members.remove(&member.id);
        self.teardown_peer(&member.id).await;
        self.emit(ClientEvent::PeerLeft(member));
    }

    async fn start_initiator(&mut self, peer: ConnectionId) {
        let epoch = self.allocate_epoch();
        let pc = match self
            .factory
            .create(&self.ice_servers, peer, epoch, self.peer_events.clone())
            .await
        {
            Ok(pc) => pc,
            Err(e) => return self.connection_error(peer, e.into()),
        };

        match PeerSession::start_as_initiator(peer, epoch, pc.clone()).await {
            Ok((session, offer)) => {
                self.sessions.insert(peer, session);
                self.send_or_warn(offer);
            }
            Err(e) => {
                let _ = pc.close().await;
                self.connection_error(peer, e);
            }
        }
    }

    async fn on_offer(&mut self, sender: ConnectionId, sender_name: DisplayName, sdp: String) {
        if self.room.is_none() {
            warn!(peer = %sender, "Offer outside a room dropped");
            return;
        }
        if let Some(existing) = self.sessions.get(&sender) {
            match existing.role() {
                Role::Initiator => warn!(peer = %sender, "Offer from our own responder dropped"),
                Role::Responder => debug!(peer = %sender, "Repeated offer ignored"),
            }
            return;
        }

        self.members.entry(sender).or_insert(sender_name);
        let early = self.early_candidates.remove(&sender).unwrap_or_default();
        let epoch = self.allocate_epoch();

        let pc = match self
            .factory
            .create(&self.ice_servers, sender, epoch, self.peer_events.clone())
            .await
        {
            Ok(pc) => pc,
            Err(e) => return self.connection_error(sender, e.into()),
        };

        match PeerSession::accept_offer(sender, epoch, pc.clone(), sdp, early).await {
            Ok((session, answer)) => {
                self.sessions.insert(sender, session);
                self.send_or_warn(answer);
            }
            Err(e) => {
                let _ = pc.close().await;
                self.connection_error(sender, e);
            }
        }
    }

    async fn on_answer(&mut self, sender: ConnectionId, sdp: String) {
        let Some(session) = self.sessions.get_mut(&sender) else {
            warn!("{}", SignalError::NegotiationMismatch(sender));
            return;
        };
        match session.apply_answer(sdp).await {
            Ok(()) => debug!(peer = %sender, "Answer applied"),
            Err(ClientError::Signal(e)) => warn!("{}", e),
            Err(e) => self.connection_error(sender, e),
        }
    }

    async fn on_remote_candidate(&mut self, sender: ConnectionId, candidate: IceCandidate) {
        if let Some(session) = self.sessions.get_mut(&sender) {
            session.add_remote_candidate(candidate).await;
            return;
        }
        if !self.members.contains_key(&sender) {
            warn!("{}", SignalError::NegotiationMismatch(sender));
            return;
        }

        let held = self.early_candidates.entry(sender).or_default();
        if held.len() >= EARLY_CANDIDATE_LIMIT {
            warn!(peer = %sender, "Early candidate buffer full, dropping candidate");
            return;
        }
        held.push(candidate);
    }

    // --- Backend events ---

    pub async fn handle_peer_event(&mut self, event: PeerEvent) {
        let PeerEvent {
            peer_id,
            epoch,
            kind,
        } = event;

        let Some(session) = self
            .sessions
            .get_mut(&peer_id)
            .filter(|s| s.epoch() == epoch)
        else {
            debug!(peer = %peer_id, epoch, "Stale peer event discarded");
            return;
        };

        match kind {
            PeerEventKind::LocalCandidate(candidate) => {
                self.send_or_warn(ClientMessage::IceCandidate {
                    candidate,
                    target_id: peer_id,
                });
            }

            PeerEventKind::DataChannelOpen { label } => {
                if label != CHAT_CHANNEL_LABEL {
                    debug!(peer = %peer_id, label = %label, "Ignoring unknown data channel");
                    return;
                }
                session.on_data_channel_open();
                info!(peer = %peer_id, "Chat channel open");
                let unnamed = self
                    .members
                    .get(&peer_id)
                    .is_none_or(|name| *name == DisplayName::unknown());
                if unnamed {
                    self.send_or_warn(ClientMessage::GetPeerDisplayName { peer_id });
                }
            }

            PeerEventKind::DataChannelClosed => {
                session.on_data_channel_closed();
                debug!(peer = %peer_id, "Chat channel closed");
            }

            PeerEventKind::DataChannelMessage(text) => self.on_channel_frame(peer_id, &text),

            PeerEventKind::RemoteTrack(kind) => {
                debug!(peer = %peer_id, ?kind, "Remote track");
                if self.layout.remote_track_added(peer_id, kind) {
                    self.emit_layout();
                }
            }

            PeerEventKind::ConnectionState(state) => {
                session.set_connection_state(state);
                info!(peer = %peer_id, ?state, "Peer connection state changed");
                if state == ConnectionState::Connected {
                    self.emit(ClientEvent::PeerOnline { peer_id });
                } else if state.is_offline() {
                    self.emit(ClientEvent::PeerOffline { peer_id, state });
                }
            }
        }
    }

    fn on_channel_frame(&self, peer_id: ConnectionId, text: &str) {
        match serde_json::from_str::<ChatFrame>(text) {
            Ok(ChatFrame::Typing { is_typing, sender }) => self.emit(ClientEvent::Typing {
                display_name: sender,
                is_typing,
            }),
            // Display follows the server echo.
            Ok(ChatFrame::Message { .. }) => debug!(peer = %peer_id, "Chat mirror received"),
            Err(e) => warn!(peer = %peer_id, "Malformed data channel frame: {}", e),
        }
    }

    // --- Teardown ---

    async fn teardown_peer(&mut self, peer: &ConnectionId) {
        self.early_candidates.remove(peer);
        if let Some(mut session) = self.sessions.remove(peer) {
            session.close().await;
        }
        if self.layout.remote_removed(*peer) {
            self.emit_layout();
        }
    }

    async fn teardown_all(&mut self) {
        let sessions: Vec<PeerSession> = self.sessions.drain().map(|(_, s)| s).collect();
        for mut session in sessions {
            session.close().await;
        }
        self.members.clear();
        self.early_candidates.clear();
        self.pending = None;
        if let Some(room) = self.room.take() {
            info!(room = %room.room_id, epoch = room.epoch, "Left room");
        }
        if self.layout.reset() {
            self.emit_layout();
        }
    }

    // --- Helpers ---

    fn ensure_idle(&self) -> Result<(), ClientError> {
        if let Some(room) = &self.room {
            return Err(ClientError::AlreadyInRoom(room.room_id.clone()));
        }
        if self.pending.is_some() {
            return Err(ClientError::RequestPending);
        }
        Ok(())
    }

    fn own_name(&self) -> Result<&DisplayName, ClientError> {
        self.room
            .as_ref()
            .map(|r| &r.display_name)
            .ok_or(ClientError::NotInRoom)
    }

    fn allocate_epoch(&mut self) -> u64 {
        let epoch = self.next_epoch;
        self.next_epoch += 1;
        epoch
    }

    fn send(&self, msg: ClientMessage) -> Result<(), ClientError> {
        self.outbound
            .send(msg)
            .map_err(|_| ClientError::ChannelClosed)
    }

    fn send_or_warn(&self, msg: ClientMessage) {
        if let Err(e) = self.send(msg) {
            warn!("Failed to send to signaling server: {}", e);
        }
    }

    fn connection_error(&self, peer_id: ConnectionId, error: ClientError) {
        warn!(peer = %peer_id, "Peer connection error: {}", error);
        self.emit(ClientEvent::ConnectionError {
            peer_id,
            message: error.to_string(),
        });
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.ui.send(event);
    }

    fn emit_layout(&self) {
        self.emit(ClientEvent::LayoutChanged {
            primary: self.layout.primary(),
            mini: self.layout.mini(),
        });
    }

    // --- Accessors ---

    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.connection_id
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        self.room.as_ref().map(|r| &r.room_id)
    }

    pub fn session(&self, peer: &ConnectionId) -> Option<&PeerSession> {
        self.sessions.get(peer)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn early_candidate_count(&self, peer: &ConnectionId) -> usize {
        self.early_candidates.get(peer).map_or(0, Vec::len)
    }

    pub fn layout(&self) -> &MediaLayout {
        &self.layout
    }

    pub fn chat_channel_open(&self) -> bool {
        self.sessions
            .values()
            .any(|s| s.data_channel_state() == DataChannelState::Open)
    }
}
