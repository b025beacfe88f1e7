use crate::room::RoomCommand;
use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use axum::extract::ws::Message;
use dashmap::DashMap;
use duet_core::{ConnectionId, IceServerConfig, ServerMessage, SignalError};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

struct SignalingInner {
    connections: DashMap<ConnectionId, mpsc::UnboundedSender<Message>>,
    ice_servers: Vec<IceServerConfig>,
}

/// Open WebSocket senders plus the command channel into the coordinator.
#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
    pub(crate) command_tx: mpsc::Sender<RoomCommand>,
}

impl SignalingService {
    pub fn new(command_tx: mpsc::Sender<RoomCommand>, ice_servers: Vec<IceServerConfig>) -> Self {
        Self {
            inner: Arc::new(SignalingInner {
                connections: DashMap::new(),
                ice_servers,
            }),
            command_tx,
        }
    }

    pub fn ice_servers(&self) -> Vec<IceServerConfig> {
        self.inner.ice_servers.clone()
    }

    pub fn add_connection(&self, connection_id: ConnectionId, tx: mpsc::UnboundedSender<Message>) {
        self.inner.connections.insert(connection_id, tx);
    }

    pub fn remove_connection(&self, connection_id: &ConnectionId) {
        self.inner.connections.remove(connection_id);
    }

    pub fn connection_count(&self) -> usize {
        self.inner.connections.len()
    }

    pub fn send(&self, connection_id: &ConnectionId, msg: &ServerMessage) -> Result<(), SignalError> {
        let Some(conn) = self.inner.connections.get(connection_id) else {
            warn!(connection = %connection_id, kind = msg.kind(), "Dropping frame for disconnected connection");
            return Err(SignalError::PeerUnreachable(*connection_id));
        };

        let json = match serde_json::to_string(msg) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize server message: {}", e);
                return Ok(());
            }
        };

        debug!(connection = %connection_id, kind = msg.kind(), "send");
        conn.send(Message::Text(json.into()))
            .map_err(|_| SignalError::PeerUnreachable(*connection_id))
    }
}

#[async_trait]
impl SignalingOutput for SignalingService {
    async fn deliver(
        &self,
        connection_id: &ConnectionId,
        message: ServerMessage,
    ) -> Result<(), SignalError> {
        self.send(connection_id, &message)
    }
}
