use duet_core::utils::ROOM_CAPACITY;
use duet_core::{ConnectionId, RoomId, SignalError};
use std::collections::HashMap;

#[derive(Debug)]
struct Room {
    epoch: u64,
    /// Join order.
    members: Vec<ConnectionId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub epoch: u64,
    pub other_members: Vec<ConnectionId>,
}

/// Rooms that currently have members. An empty room is removed, so its
/// identifier is free for the next `create_room`.
#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: HashMap<RoomId, Room>,
    next_epoch: u64,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a room with `creator` as its only member and returns the
    /// incarnation epoch.
    pub fn create_room(
        &mut self,
        room_id: RoomId,
        creator: ConnectionId,
    ) -> Result<u64, SignalError> {
        if self.rooms.contains_key(&room_id) {
            return Err(SignalError::AlreadyExists(room_id));
        }

        self.next_epoch += 1;
        let epoch = self.next_epoch;
        self.rooms.insert(
            room_id,
            Room {
                epoch,
                members: vec![creator],
            },
        );
        Ok(epoch)
    }

    /// Capacity check and insert happen under the same `&mut self`.
    pub fn join_room(
        &mut self,
        room_id: &RoomId,
        connection_id: ConnectionId,
    ) -> Result<JoinOutcome, SignalError> {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return Err(SignalError::NotFound(room_id.clone()));
        };
        if room.members.len() >= ROOM_CAPACITY {
            return Err(SignalError::Full(room_id.clone()));
        }

        let other_members = room.members.clone();
        room.members.push(connection_id);
        Ok(JoinOutcome {
            epoch: room.epoch,
            other_members,
        })
    }

    /// Removes a member and returns whoever is left.
    pub fn leave(&mut self, room_id: &RoomId, connection_id: &ConnectionId) -> Vec<ConnectionId> {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return Vec::new();
        };
        room.members.retain(|m| m != connection_id);

        if room.members.is_empty() {
            self.rooms.remove(room_id);
            return Vec::new();
        }
        room.members.clone()
    }

    pub fn members(&self, room_id: &RoomId) -> &[ConnectionId] {
        self.rooms
            .get(room_id)
            .map(|r| r.members.as_slice())
            .unwrap_or_default()
    }

    pub fn exists(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn epoch(&self, room_id: &RoomId) -> Option<u64> {
        self.rooms.get(room_id).map(|r| r.epoch)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
