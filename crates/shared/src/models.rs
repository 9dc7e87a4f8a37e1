use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{REPLY_ATTACHMENT_PLACEHOLDER, TEMP_ID_PREFIX};
use crate::validation::identity_eq;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    #[default]
    None,
    Image,
    Audio,
}

impl AttachmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentKind::None => "none",
            AttachmentKind::Image => "image",
            AttachmentKind::Audio => "audio",
        }
    }

    /// Unknown values read back from storage degrade to `None`.
    pub fn from_db(value: &str) -> Self {
        match value {
            "image" => AttachmentKind::Image,
            "audio" => AttachmentKind::Audio,
            _ => AttachmentKind::None,
        }
    }

    /// MIME prefix the embedded data URL must carry for this kind.
    pub fn data_url_prefix(&self) -> Option<&'static str> {
        match self {
            AttachmentKind::None => None,
            AttachmentKind::Image => Some("data:image/"),
            AttachmentKind::Audio => Some("data:audio/"),
        }
    }
}

/// Binary payload embedded as a base64 data URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default)]
    pub kind: AttachmentKind,
    #[serde(default)]
    pub data: String,
}

impl Attachment {
    pub fn is_present(&self) -> bool {
        self.kind != AttachmentKind::None && !self.data.is_empty()
    }
}

/// Denormalized snapshot of the message being replied to. It is never
/// refreshed when the original is edited or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRef {
    pub id: String,
    pub author_name: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub author_name: String,
    pub author_id: String,
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_ref: Option<ReplyRef>,
    #[serde(default)]
    pub edited: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_message_id: Option<String>,
    // Process-local state, never written to the store.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reactions: BTreeMap<String, BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub read_by: BTreeSet<String>,
}

impl Message {
    /// Optimistic copies carry a client-side `temp_` id until confirmed.
    pub fn is_temporary(&self) -> bool {
        self.id.starts_with(TEMP_ID_PREFIX)
    }

    pub fn is_authored_by(&self, author_id: &str) -> bool {
        identity_eq(&self.author_id, author_id)
    }

    pub fn present_attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref().filter(|a| a.is_present())
    }

    pub fn reply_snapshot(&self) -> ReplyRef {
        let body = match self.body.as_deref().map(str::trim) {
            Some(b) if !b.is_empty() => b.to_string(),
            _ => REPLY_ATTACHMENT_PLACEHOLDER.to_string(),
        };
        ReplyRef {
            id: self.id.clone(),
            author_name: self.author_name.clone(),
            body,
        }
    }
}
