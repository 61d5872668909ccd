use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use super::preview_handle::PreviewHandle;

/// Store-assigned message identifier. Strictly increasing, never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct MessageId(pub(crate) u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// An encoded file ready to be attached to an outgoing user message.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub mime_type: String,
    /// Base64 payload (standard alphabet, padded)
    pub data: String,
    /// Original file name, for display only
    pub file_name: String,
    #[serde(skip)]
    pub(crate) preview: Option<PreviewHandle>,
}

impl Attachment {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
            file_name: String::new(),
            preview: None,
        }
    }

    /// Local preview reference. Valid only while this attachment (or a clone
    /// of it) is alive; never sent upstream.
    pub fn url(&self) -> Option<String> {
        self.preview.as_ref().map(PreviewHandle::url)
    }

    pub fn preview(&self) -> Option<&PreviewHandle> {
        self.preview.as_ref()
    }
}

impl PartialEq for Attachment {
    fn eq(&self, other: &Self) -> bool {
        self.mime_type == other.mime_type && self.data == other.data
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GroundingSource {
    pub title: String,
    pub uri: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<GroundingSource>,
    pub is_streaming: bool,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub(crate) fn user(id: MessageId, content: String, attachments: Vec<Attachment>) -> Self {
        Self {
            id,
            role: Role::User,
            content,
            attachments,
            sources: Vec::new(),
            is_streaming: false,
            timestamp: Utc::now(),
        }
    }

    pub(crate) fn placeholder(id: MessageId) -> Self {
        Self {
            id,
            role: Role::Model,
            content: String::new(),
            attachments: Vec::new(),
            sources: Vec::new(),
            is_streaming: true,
            timestamp: Utc::now(),
        }
    }
}
