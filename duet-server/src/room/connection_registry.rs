use chrono::{DateTime, Utc};
use duet_core::{ConnectionId, DisplayName, RoomId, SignalError};
use std::collections::HashMap;

/// One live transport link and what the server knows about it.
#[derive(Debug, Clone)]
pub struct Connection {
    pub display_name: Option<DisplayName>,
    pub room: Option<RoomId>,
    pub connected_at: DateTime<Utc>,
}

/// Maps connection identifiers to identity and room membership.
///
/// Owned by the coordinator task; every access is serialized through it.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self, connection_id: ConnectionId) {
        self.connections.insert(
            connection_id,
            Connection {
                display_name: None,
                room: None,
                connected_at: Utc::now(),
            },
        );
    }

    pub fn disconnect(&mut self, connection_id: &ConnectionId) -> Option<Connection> {
        self.connections.remove(connection_id)
    }

    pub fn is_connected(&self, connection_id: &ConnectionId) -> bool {
        self.connections.contains_key(connection_id)
    }

    /// Checks that `connection_id` may enter a room under `display_name`.
    /// Does not mutate anything.
    pub fn check_admission(
        &self,
        connection_id: &ConnectionId,
        display_name: &DisplayName,
    ) -> Result<(), SignalError> {
        let Some(conn) = self.connections.get(connection_id) else {
            return Err(SignalError::invalid("Connection is not registered."));
        };
        if let Some(room) = &conn.room {
            return Err(SignalError::invalid(format!(
                "Already in room {room}. Leave it first."
            )));
        }
        match &conn.display_name {
            Some(bound) if bound != display_name => Err(SignalError::invalid(format!(
                "Display name is already set to {bound} on this connection."
            ))),
            _ => Ok(()),
        }
    }

    /// Binds identity and membership. Callers run [`Self::check_admission`] first.
    pub fn register_identity(
        &mut self,
        connection_id: &ConnectionId,
        display_name: DisplayName,
        room_id: RoomId,
    ) {
        if let Some(conn) = self.connections.get_mut(connection_id) {
            conn.display_name.get_or_insert(display_name);
            conn.room = Some(room_id);
        }
    }

    pub fn lookup_identity(&self, connection_id: &ConnectionId) -> Option<&DisplayName> {
        self.connections
            .get(connection_id)
            .and_then(|c| c.display_name.as_ref())
    }

    /// Identity for outbound frames. Never fails.
    pub fn display_name_or_unknown(&self, connection_id: &ConnectionId) -> DisplayName {
        self.lookup_identity(connection_id)
            .cloned()
            .unwrap_or_else(DisplayName::unknown)
    }

    pub fn room_of(&self, connection_id: &ConnectionId) -> Option<&RoomId> {
        self.connections
            .get(connection_id)
            .and_then(|c| c.room.as_ref())
    }

    /// Drops room membership, keeping the bound name.
    pub fn clear_membership(&mut self, connection_id: &ConnectionId) -> Option<RoomId> {
        self.connections
            .get_mut(connection_id)
            .and_then(|c| c.room.take())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}
