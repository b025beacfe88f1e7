mod chat;
mod connection;
mod identity;
mod room;
mod signaling;

pub use chat::{ChatFrame, ChatMessage, HistoryEntry};
pub use connection::ConnectionId;
pub use identity::DisplayName;
pub use room::RoomId;
pub use signaling::{ClientMessage, ErrorCode, IceCandidate, IceServerConfig, Member, ServerMessage};
