use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Attachment, Message, ReplyRef};

pub type ConnectionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionAction {
    Add,
    Remove,
}

// ── Client → Server Events ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    Join {
        #[serde(rename = "displayName")]
        display_name: String,
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        secret: Option<String>,
    },
    SendMessage {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attachment: Option<Attachment>,
        #[serde(default, skip_serializing_if = "Option::is_none", rename = "replyRef")]
        reply_ref: Option<ReplyRef>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
        #[serde(default, skip_serializing_if = "Option::is_none", rename = "clientMessageId")]
        client_message_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none", rename = "authorName")]
        author_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none", rename = "authorId")]
        author_id: Option<String>,
    },
    DeleteMessage {
        id: String,
    },
    Typing {
        #[serde(rename = "displayName")]
        display_name: String,
        #[serde(rename = "isTyping")]
        is_typing: bool,
    },
    MarkMessageRead {
        id: String,
        reader: String,
    },
    AddReaction {
        id: String,
        emoji: String,
        actor: String,
    },
    RemoveReaction {
        id: String,
        emoji: String,
        actor: String,
    },
    EditMessage {
        id: String,
        #[serde(rename = "newBody")]
        new_body: String,
    },
    Ping,
}

// ── Server → Client Events ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Joined {
        #[serde(rename = "welcomeText")]
        welcome_text: String,
        #[serde(rename = "connectionId")]
        connection_id: ConnectionId,
    },
    MessageHistory {
        messages: Vec<Message>,
    },
    ReceiveMessage {
        message: Message,
    },
    MessageDeleted {
        id: String,
    },
    DeleteMessageError {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        reason: String,
    },
    UserTyping {
        #[serde(rename = "displayName")]
        display_name: String,
        #[serde(rename = "isTyping")]
        is_typing: bool,
    },
    UserJoined {
        #[serde(rename = "displayName")]
        display_name: String,
        #[serde(rename = "userId")]
        user_id: String,
    },
    UserLeft {
        #[serde(rename = "displayName")]
        display_name: String,
    },
    MessageReaction {
        id: String,
        emoji: String,
        actor: String,
        action: ReactionAction,
    },
    MessageEdited {
        id: String,
        #[serde(rename = "newBody")]
        new_body: String,
    },
    MessageRead {
        id: String,
        #[serde(rename = "readBy")]
        read_by: Vec<String>,
        #[serde(rename = "readAt")]
        read_at: DateTime<Utc>,
    },
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none", rename = "clientMessageId")]
        client_message_id: Option<String>,
    },
}
