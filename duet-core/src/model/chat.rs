use crate::model::connection::ConnectionId;
use crate::model::identity::DisplayName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical copy of a chat message as broadcast by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub sender_id: ConnectionId,
    pub display_name: DisplayName,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_ref: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A persisted message. Connection ids are ephemeral and are not stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub display_name: DisplayName,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_ref: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<&ChatMessage> for HistoryEntry {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            display_name: msg.display_name.clone(),
            body: msg.body.clone(),
            file_ref: msg.file_ref.clone(),
            timestamp: msg.timestamp,
        }
    }
}

/// Frames exchanged peer-to-peer over the chat data channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChatFrame {
    #[serde(rename = "chatMessage", rename_all = "camelCase")]
    Message {
        body: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_ref: Option<String>,
        sender: String,
    },

    #[serde(rename = "typing", rename_all = "camelCase")]
    Typing { is_typing: bool, sender: String },
}
