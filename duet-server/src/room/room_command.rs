use duet_core::{ClientMessage, ConnectionId, HistoryEntry, RoomId};

/// Events fed to the coordinator by the WebSocket layer.
#[derive(Debug)]
pub enum RoomCommand {
    /// Transport accepted. The identifier was assigned by the server.
    Connected { connection_id: ConnectionId },

    /// A decoded client frame.
    Signal {
        connection_id: ConnectionId,
        message: ClientMessage,
    },

    /// Transport closed, for whatever reason.
    Disconnected { connection_id: ConnectionId },

    /// History for a join finished loading (or gave up). Only honoured while
    /// the connection is still in that room incarnation.
    HistoryLoaded {
        connection_id: ConnectionId,
        room_id: RoomId,
        epoch: u64,
        history: Vec<HistoryEntry>,
    },
}
