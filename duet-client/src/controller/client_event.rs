use crate::controller::Slot;
use crate::peer::ConnectionState;
use duet_core::{ChatMessage, ConnectionId, DisplayName, HistoryEntry, Member, RoomId};

/// What the presentation layer gets told about.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The server assigned this connection its id.
    Connected { connection_id: ConnectionId },

    RoomCreated { room_id: RoomId },

    RoomJoined {
        room_id: RoomId,
        display_name: DisplayName,
        other_members: Vec<Member>,
        history: Vec<HistoryEntry>,
    },

    /// A create or join was refused. `reason` is user-facing.
    Rejected { reason: String },

    PeerJoined(Member),

    PeerLeft(Member),

    PeerOnline { peer_id: ConnectionId },

    /// The connection dropped or failed. The session stays until the peer leaves.
    PeerOffline {
        peer_id: ConnectionId,
        state: ConnectionState,
    },

    PeerIdentified {
        peer_id: ConnectionId,
        display_name: DisplayName,
    },

    ChatReceived { message: ChatMessage, own: bool },

    Typing {
        display_name: String,
        is_typing: bool,
    },

    LayoutChanged {
        primary: Option<Slot>,
        mini: Option<Slot>,
    },

    ConnectionError {
        peer_id: ConnectionId,
        message: String,
    },

    Left,
}
