use crate::model::chat::{ChatMessage, HistoryEntry};
use crate::model::connection::ConnectionId;
use crate::model::identity::DisplayName;
use crate::model::room::RoomId;
use crate::utils::{DEFAULT_STUN_ADDR, DEFAULT_STUN_ADDR_2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServerConfig {
    /// Public Google STUN servers, used when nothing else is configured.
    pub fn default_stun() -> Vec<Self> {
        vec![Self {
            urls: vec![DEFAULT_STUN_ADDR.to_string(), DEFAULT_STUN_ADDR_2.to_string()],
            username: None,
            credential: None,
        }]
    }
}

/// Browser `RTCIceCandidateInit` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default)]
    pub sdp_m_line_index: Option<u16>,
}

/// A room member as announced to other members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: ConnectionId,
    pub display_name: DisplayName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    AlreadyExists,
    InvalidRequest,
}

/// Frames a client may send. None of them carries the sender's identity:
/// the server resolves it from its own registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "d")]
pub enum ClientMessage {
    #[serde(rename = "room:create", rename_all = "camelCase")]
    CreateRoom {
        #[serde(default)]
        room_id: Option<String>,
        #[serde(default)]
        display_name: String,
    },

    #[serde(rename = "room:join", rename_all = "camelCase")]
    JoinRoom {
        #[serde(default)]
        room_id: String,
        #[serde(default)]
        display_name: String,
    },

    #[serde(rename = "room:leave")]
    LeaveRoom {},

    #[serde(rename = "offer", rename_all = "camelCase")]
    Offer { sdp: String, target_id: ConnectionId },

    #[serde(rename = "answer", rename_all = "camelCase")]
    Answer { sdp: String, target_id: ConnectionId },

    #[serde(rename = "ice-candidate", rename_all = "camelCase")]
    IceCandidate {
        candidate: IceCandidate,
        target_id: ConnectionId,
    },

    #[serde(rename = "chat:message", rename_all = "camelCase")]
    ChatMessage {
        #[serde(default)]
        body: String,
        #[serde(default)]
        file_ref: Option<String>,
    },

    #[serde(rename = "chat:typing", rename_all = "camelCase")]
    Typing { is_typing: bool },

    #[serde(rename = "get:peer:displayName", rename_all = "camelCase")]
    GetPeerDisplayName { peer_id: ConnectionId },
}

/// Frames the server sends. Every identity field here is filled in by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "d")]
pub enum ServerMessage {
    #[serde(rename = "welcome", rename_all = "camelCase")]
    Welcome {
        connection_id: ConnectionId,
        ice_servers: Vec<IceServerConfig>,
    },

    #[serde(rename = "room:created", rename_all = "camelCase")]
    RoomCreated { room_id: RoomId, epoch: u64 },

    #[serde(rename = "room:joined", rename_all = "camelCase")]
    RoomJoined {
        room_id: RoomId,
        epoch: u64,
        display_name: DisplayName,
        other_members: Vec<Member>,
        chat_history: Vec<HistoryEntry>,
    },

    #[serde(rename = "room:not-found")]
    RoomNotFound {},

    #[serde(rename = "room:full")]
    RoomFull {},

    #[serde(rename = "error")]
    Error { code: ErrorCode, message: String },

    #[serde(rename = "user:joined")]
    UserJoined(Member),

    #[serde(rename = "user:left")]
    UserLeft(Member),

    #[serde(rename = "offer", rename_all = "camelCase")]
    Offer {
        sdp: String,
        sender_id: ConnectionId,
        sender_display_name: DisplayName,
    },

    #[serde(rename = "answer", rename_all = "camelCase")]
    Answer {
        sdp: String,
        sender_id: ConnectionId,
        sender_display_name: DisplayName,
    },

    #[serde(rename = "ice-candidate", rename_all = "camelCase")]
    IceCandidate {
        candidate: IceCandidate,
        sender_id: ConnectionId,
    },

    #[serde(rename = "chat:message")]
    ChatMessage(ChatMessage),

    #[serde(rename = "chat:typing", rename_all = "camelCase")]
    ChatTyping {
        sender_id: ConnectionId,
        display_name: DisplayName,
        is_typing: bool,
    },

    #[serde(rename = "get:peer:displayName:response", rename_all = "camelCase")]
    PeerDisplayName {
        peer_id: ConnectionId,
        display_name: DisplayName,
    },
}

impl ServerMessage {
    /// Wire name of the frame, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "welcome",
            Self::RoomCreated { .. } => "room:created",
            Self::RoomJoined { .. } => "room:joined",
            Self::RoomNotFound {} => "room:not-found",
            Self::RoomFull {} => "room:full",
            Self::Error { .. } => "error",
            Self::UserJoined(_) => "user:joined",
            Self::UserLeft(_) => "user:left",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "ice-candidate",
            Self::ChatMessage(_) => "chat:message",
            Self::ChatTyping { .. } => "chat:typing",
            Self::PeerDisplayName { .. } => "get:peer:displayName:response",
        }
    }
}
