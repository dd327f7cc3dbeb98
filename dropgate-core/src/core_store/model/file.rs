//! Stored file entity

use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::{Timestamp, UserId};
use crate::core_access::AccessPolicy;

/// Kind of uploaded content, as classified by the messenger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Document,
    Photo,
    Video,
    Audio,
    Voice,
    Animation,
    Sticker,
}

impl ContentKind {
    /// Whether the messenger can attach a caption to this kind
    pub fn supports_caption(&self) -> bool {
        !matches!(self, ContentKind::Sticker)
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContentKind::Document => "document",
            ContentKind::Photo => "photo",
            ContentKind::Video => "video",
            ContentKind::Audio => "audio",
            ContentKind::Voice => "voice",
            ContentKind::Animation => "animation",
            ContentKind::Sticker => "sticker",
        };
        write!(f, "{}", s)
    }
}

/// A single uploaded file, addressed by its share code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFile {
    /// Unique key in the global code namespace
    pub code: String,

    /// Uploader; always passes the access check
    pub owner: UserId,

    /// Opaque handle into the storage channel
    pub store_msg_id: i64,

    /// Content classification from the messenger
    pub content_kind: ContentKind,

    /// Caption supplied at upload time (may be empty)
    pub caption: String,

    /// Upload time
    pub created_at: Timestamp,

    /// Visibility record
    pub access: AccessPolicy,
}

impl StoredFile {
    pub fn new(
        code: String,
        owner: UserId,
        store_msg_id: i64,
        content_kind: ContentKind,
        caption: String,
        created_at: Timestamp,
    ) -> Self {
        Self {
            code,
            owner,
            store_msg_id,
            content_kind,
            caption,
            created_at,
            access: AccessPolicy::default(),
        }
    }
}
