use crate::room::{ConnectionRegistry, RoomCommand, RoomDirectory};
use crate::signaling::{RelayPayload, SignalingOutput, relay_frame};
use crate::storage::ChatStore;
use chrono::Utc;
use duet_core::{
    ChatMessage, ClientMessage, ConnectionId, DisplayName, HistoryEntry, Member, RoomId,
    ServerMessage, SignalError,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub max_message_length: usize,
    pub history_timeout: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            max_message_length: 4000,
            history_timeout: Duration::from_millis(2000),
        }
    }
}

/// A join whose membership is committed but whose `room:joined` still waits
/// on the history load.
#[derive(Debug)]
struct PendingJoin {
    room_id: RoomId,
    epoch: u64,
    display_name: DisplayName,
    other_members: Vec<Member>,
    /// Frames addressed to the joiner before `room:joined` went out.
    held: Vec<ServerMessage>,
}

/// Single owner of the room directory and connection registry.
///
/// Commands are handled one at a time to completion, so a capacity check and
/// the membership insert that follows it can never interleave with another
/// request. Store reads run on their own tasks and come back as
/// [`RoomCommand::HistoryLoaded`].
pub struct Coordinator {
    directory: RoomDirectory,
    registry: ConnectionRegistry,
    command_rx: mpsc::Receiver<RoomCommand>,
    loaded_tx: mpsc::UnboundedSender<RoomCommand>,
    loaded_rx: mpsc::UnboundedReceiver<RoomCommand>,
    joining: HashMap<ConnectionId, PendingJoin>,
    output: Arc<dyn SignalingOutput>,
    store: Arc<dyn ChatStore>,
    settings: CoordinatorSettings,
}

impl Coordinator {
    pub fn new(
        command_rx: mpsc::Receiver<RoomCommand>,
        output: Arc<dyn SignalingOutput>,
        store: Arc<dyn ChatStore>,
        settings: CoordinatorSettings,
    ) -> Self {
        let (loaded_tx, loaded_rx) = mpsc::unbounded_channel();
        Self {
            directory: RoomDirectory::new(),
            registry: ConnectionRegistry::new(),
            command_rx,
            loaded_tx,
            loaded_rx,
            joining: HashMap::new(),
            output,
            store,
            settings,
        }
    }

    pub async fn run(mut self) {
        info!("Coordinator event loop started");

        loop {
            let cmd = tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(cmd) => cmd,
                    None => break,
                },
                Some(cmd) = self.loaded_rx.recv() => cmd,
            };
            self.handle_command(cmd).await;
        }

        info!(
            rooms = self.directory.room_count(),
            connections = self.registry.connection_count(),
            "Command channel closed. Coordinator finished."
        );
    }

    async fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Connected { connection_id } => {
                debug!(connection = %connection_id, "registered");
                self.registry.connect(connection_id);
            }

            RoomCommand::Signal {
                connection_id,
                message,
            } => {
                if let Err(err) = self.handle_signal(connection_id, message).await {
                    self.report(connection_id, err).await;
                }
            }

            RoomCommand::Disconnected { connection_id } => {
                self.leave_room(connection_id).await;
                if let Some(conn) = self.registry.disconnect(&connection_id) {
                    let session = Utc::now() - conn.connected_at;
                    info!(
                        connection = %connection_id,
                        seconds = session.num_seconds(),
                        remaining = self.registry.connection_count(),
                        "Connection closed"
                    );
                }
            }

            RoomCommand::HistoryLoaded {
                connection_id,
                room_id,
                epoch,
                history,
            } => {
                self.finish_join(connection_id, room_id, epoch, history)
                    .await;
            }
        }
    }

    async fn handle_signal(
        &mut self,
        connection_id: ConnectionId,
        message: ClientMessage,
    ) -> Result<(), SignalError> {
        match message {
            ClientMessage::CreateRoom {
                room_id,
                display_name,
            } => {
                self.create(connection_id, room_id.as_deref(), &display_name)
                    .await
            }
            ClientMessage::JoinRoom {
                room_id,
                display_name,
            } => self.join(connection_id, &room_id, &display_name).await,
            ClientMessage::LeaveRoom {} => {
                self.leave_room(connection_id).await;
                Ok(())
            }
            ClientMessage::Offer { sdp, target_id } => {
                self.forward(connection_id, target_id, RelayPayload::Offer { sdp })
                    .await
            }
            ClientMessage::Answer { sdp, target_id } => {
                self.forward(connection_id, target_id, RelayPayload::Answer { sdp })
                    .await
            }
            ClientMessage::IceCandidate {
                candidate,
                target_id,
            } => {
                self.forward(
                    connection_id,
                    target_id,
                    RelayPayload::IceCandidate { candidate },
                )
                .await
            }
            ClientMessage::ChatMessage { body, file_ref } => {
                self.chat(connection_id, body, file_ref).await
            }
            ClientMessage::Typing { is_typing } => {
                self.typing(connection_id, is_typing).await;
                Ok(())
            }
            ClientMessage::GetPeerDisplayName { peer_id } => {
                self.peer_display_name(connection_id, peer_id).await;
                Ok(())
            }
        }
    }

    async fn create(
        &mut self,
        connection_id: ConnectionId,
        requested: Option<&str>,
        display_name: &str,
    ) -> Result<(), SignalError> {
        let display_name = DisplayName::parse(display_name)?;
        let room_id = match requested.map(str::trim).filter(|r| !r.is_empty()) {
            Some(raw) => RoomId::parse(raw)?,
            None => self.unused_room_id(),
        };
        self.registry
            .check_admission(&connection_id, &display_name)?;

        let epoch = self.directory.create_room(room_id.clone(), connection_id)?;
        self.registry
            .register_identity(&connection_id, display_name.clone(), room_id.clone());

        info!(room = %room_id, epoch, connection = %connection_id, "Room created");

        self.send_to(
            &connection_id,
            ServerMessage::RoomCreated {
                room_id: room_id.clone(),
                epoch,
            },
        )
        .await;
        // nobody else is here yet
        self.broadcast(
            &room_id,
            Some(&connection_id),
            ServerMessage::UserJoined(Member {
                id: connection_id,
                display_name,
            }),
        )
        .await;
        Ok(())
    }

    async fn join(
        &mut self,
        connection_id: ConnectionId,
        room_id: &str,
        display_name: &str,
    ) -> Result<(), SignalError> {
        let display_name = DisplayName::parse(display_name)?;
        let room_id = RoomId::parse(room_id)?;
        self.registry
            .check_admission(&connection_id, &display_name)?;

        let outcome = self.directory.join_room(&room_id, connection_id)?;
        self.registry
            .register_identity(&connection_id, display_name.clone(), room_id.clone());

        let other_members = outcome
            .other_members
            .iter()
            .map(|id| Member {
                id: *id,
                display_name: self.registry.display_name_or_unknown(id),
            })
            .collect();

        debug!(
            room = %room_id,
            epoch = outcome.epoch,
            connection = %connection_id,
            "Membership committed, loading history"
        );

        self.joining.insert(
            connection_id,
            PendingJoin {
                room_id: room_id.clone(),
                epoch: outcome.epoch,
                display_name,
                other_members,
                held: Vec::new(),
            },
        );

        let store = self.store.clone();
        let timeout = self.settings.history_timeout;
        let loaded_tx = self.loaded_tx.clone();
        let epoch = outcome.epoch;
        tokio::spawn(async move {
            let history = load_history(store.as_ref(), &room_id, timeout).await;
            let _ = loaded_tx.send(RoomCommand::HistoryLoaded {
                connection_id,
                room_id,
                epoch,
                history,
            });
        });
        Ok(())
    }

    /// Completes a join once its history is in. A join whose connection has
    /// since left, or whose room incarnation is gone, is dropped.
    async fn finish_join(
        &mut self,
        connection_id: ConnectionId,
        room_id: RoomId,
        epoch: u64,
        chat_history: Vec<HistoryEntry>,
    ) {
        let current = self.joining.get(&connection_id).is_some_and(|p| {
            p.room_id == room_id && p.epoch == epoch
        }) && self.directory.epoch(&room_id) == Some(epoch)
            && self.registry.room_of(&connection_id) == Some(&room_id);
        if !current {
            debug!(room = %room_id, connection = %connection_id, "stale history load dropped");
            return;
        }
        let Some(pending) = self.joining.remove(&connection_id) else {
            return;
        };

        info!(room = %room_id, epoch, connection = %connection_id, "Joined room");

        self.send_to(
            &connection_id,
            ServerMessage::RoomJoined {
                room_id: room_id.clone(),
                epoch,
                display_name: pending.display_name.clone(),
                other_members: pending.other_members,
                chat_history,
            },
        )
        .await;
        for message in pending.held {
            self.send_to(&connection_id, message).await;
        }
        // others learn about the joiner only after it knows its room
        self.broadcast(
            &room_id,
            Some(&connection_id),
            ServerMessage::UserJoined(Member {
                id: connection_id,
                display_name: pending.display_name,
            }),
        )
        .await;
    }

    async fn leave_room(&mut self, connection_id: ConnectionId) {
        let Some(room_id) = self.registry.clear_membership(&connection_id) else {
            return;
        };
        let remaining = self.directory.leave(&room_id, &connection_id);
        let announced = self.joining.remove(&connection_id).is_none();

        info!(
            room = %room_id,
            connection = %connection_id,
            remaining = remaining.len(),
            "Left room"
        );
        if !announced {
            return;
        }

        let departed = Member {
            id: connection_id,
            display_name: self.registry.display_name_or_unknown(&connection_id),
        };
        for peer in remaining {
            let msg = ServerMessage::UserLeft(departed.clone());
            if let Some(pending) = self.joining.get_mut(&peer) {
                pending.held.push(msg);
                continue;
            }
            self.send_to(&peer, msg).await;
        }
    }

    async fn forward(
        &mut self,
        sender: ConnectionId,
        target: ConnectionId,
        payload: RelayPayload,
    ) -> Result<(), SignalError> {
        let message = relay_frame(&self.registry, sender, target, payload)?;
        if let Some(pending) = self.joining.get_mut(&target) {
            pending.held.push(message);
            return Ok(());
        }
        self.output.deliver(&target, message).await
    }

    async fn chat(
        &mut self,
        connection_id: ConnectionId,
        body: String,
        file_ref: Option<String>,
    ) -> Result<(), SignalError> {
        let Some(room_id) = self.registry.room_of(&connection_id).cloned() else {
            return Err(SignalError::invalid("Join a room before sending messages."));
        };

        let file_ref = file_ref.filter(|f| !f.trim().is_empty());
        if body.trim().is_empty() && file_ref.is_none() {
            return Err(SignalError::invalid("Message body is required."));
        }
        if body.chars().count() > self.settings.max_message_length {
            return Err(SignalError::invalid(format!(
                "Message must be at most {} characters.",
                self.settings.max_message_length
            )));
        }

        let message = ChatMessage {
            sender_id: connection_id,
            display_name: self.registry.display_name_or_unknown(&connection_id),
            body,
            file_ref,
            timestamp: Utc::now(),
        };
        let entry = HistoryEntry::from(&message);

        self.broadcast(&room_id, None, ServerMessage::ChatMessage(message))
            .await;

        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(e) = store.save_message(&room_id, &entry).await {
                warn!(room = %room_id, "Failed to save chat message: {}", e);
            }
        });
        Ok(())
    }

    async fn typing(&mut self, connection_id: ConnectionId, is_typing: bool) {
        let Some(room_id) = self.registry.room_of(&connection_id).cloned() else {
            debug!(connection = %connection_id, "typing outside a room ignored");
            return;
        };

        let msg = ServerMessage::ChatTyping {
            sender_id: connection_id,
            display_name: self.registry.display_name_or_unknown(&connection_id),
            is_typing,
        };
        self.broadcast(&room_id, Some(&connection_id), msg).await;
    }

    async fn peer_display_name(&self, requester: ConnectionId, peer_id: ConnectionId) {
        let Some(display_name) = self.registry.lookup_identity(&peer_id) else {
            debug!(connection = %requester, peer = %peer_id, "display name lookup missed");
            return;
        };

        let msg = ServerMessage::PeerDisplayName {
            peer_id,
            display_name: display_name.clone(),
        };
        self.send_to(&requester, msg).await;
    }

    fn unused_room_id(&self) -> RoomId {
        loop {
            let id = RoomId::generate();
            if !self.directory.exists(&id) {
                return id;
            }
        }
    }

    /// Members still waiting on `room:joined` get the frame after it.
    async fn broadcast(
        &mut self,
        room_id: &RoomId,
        except: Option<&ConnectionId>,
        message: ServerMessage,
    ) {
        let recipients: Vec<ConnectionId> = self
            .directory
            .members(room_id)
            .iter()
            .filter(|m| Some(*m) != except)
            .copied()
            .collect();
        for member in recipients {
            if let Some(pending) = self.joining.get_mut(&member) {
                pending.held.push(message.clone());
                continue;
            }
            self.send_to(&member, message.clone()).await;
        }
    }

    async fn send_to(&self, connection_id: &ConnectionId, message: ServerMessage) {
        if let Err(e) = self.output.deliver(connection_id, message).await {
            warn!(connection = %connection_id, "Delivery failed: {}", e);
        }
    }

    async fn report(&self, connection_id: ConnectionId, err: SignalError) {
        match err.to_server_message() {
            Some(reply) => {
                info!(connection = %connection_id, "Request rejected: {}", err);
                self.send_to(&connection_id, reply).await;
            }
            None => warn!(connection = %connection_id, "Dropped: {}", err),
        }
    }
}

async fn load_history(
    store: &dyn ChatStore,
    room_id: &RoomId,
    timeout: Duration,
) -> Vec<HistoryEntry> {
    match tokio::time::timeout(timeout, store.load_history(room_id)).await {
        Ok(Ok(history)) => history,
        Ok(Err(e)) => {
            warn!(room = %room_id, "Failed to load chat history: {}", e);
            Vec::new()
        }
        Err(_) => {
            warn!(room = %room_id, "Timed out loading chat history");
            Vec::new()
        }
    }
}
