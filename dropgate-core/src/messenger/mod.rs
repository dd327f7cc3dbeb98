//! Chat transport seam
//!
//! The engine never talks to a chat network directly; it goes through this
//! trait. A transport adapter classifies raw updates into [`InboundEvent`]s
//! and implements the outbound calls. Transport failures carry the raw
//! detail so owner-visible operations can surface it.

use async_trait::async_trait;
use std::fmt;

use crate::core_store::model::{ContentKind, UserId};

/// Destination chat: a user's private chat or a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

impl From<UserId> for ChatId {
    fn from(user: UserId) -> Self {
        ChatId(user.0)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote handle to a media object held by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    /// Transport-scoped identifier usable for re-sending
    pub remote_id: String,

    /// Content classification
    pub kind: ContentKind,

    /// Original file name, when the transport exposes one
    pub file_name: Option<String>,

    /// MIME type, when the transport exposes one
    pub mime_type: Option<String>,
}

impl MediaRef {
    /// Whether the payload is an image, by MIME type or file extension.
    /// Photos always are; documents only when they carry an image payload.
    pub fn is_image(&self) -> bool {
        if self.kind == ContentKind::Photo {
            return true;
        }
        if let Some(mime) = &self.mime_type {
            if mime.to_lowercase().starts_with("image/") {
                return true;
            }
        }
        if let Some(name) = &self.file_name {
            let name = name.to_lowercase();
            return [".jpg", ".jpeg", ".png", ".webp", ".bmp"]
                .iter()
                .any(|ext| name.ends_with(ext));
        }
        false
    }
}

/// A media message received from a user
#[derive(Debug, Clone)]
pub struct IncomingMedia {
    /// Message id in the sender's chat, usable for copy/forward
    pub message_id: i64,

    pub media: MediaRef,

    pub caption: Option<String>,
}

/// One button of an inline keyboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    /// Opaque payload echoed back in a `ButtonPress` event
    pub payload: String,
}

impl Button {
    pub fn new(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            payload: payload.into(),
        }
    }
}

/// Rows of inline buttons attached to a message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        self.rows.push(buttons);
        self
    }
}

/// What an inbound event carries
#[derive(Debug, Clone)]
pub enum EventPayload {
    /// A slash command with its remaining text
    Command { name: String, args: String },
    /// Plain (non-command) text
    Text(String),
    /// A media upload
    Media(IncomingMedia),
    /// An inline-button press, carrying the button payload
    ButtonPress(String),
}

/// One classified update from the transport
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// Messenger-provided numeric identity of the sender
    pub sender: UserId,

    /// Display name for captions and notices
    pub sender_name: String,

    pub payload: EventPayload,
}

/// Transport call failure with the raw technical detail attached
#[derive(Debug, Clone, thiserror::Error)]
#[error("Transport error: {0}")]
pub struct TransportError(pub String);

/// Outbound chat capability consumed by the engine
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send plain text to a chat
    async fn send_message(&self, chat: ChatId, text: &str) -> Result<(), TransportError>;

    /// Send text with an inline keyboard attached
    async fn send_keyboard(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Keyboard,
    ) -> Result<(), TransportError>;

    /// Copy a message between chats, returning the new message id.
    /// Used for persisting uploads into the store channel and serving them
    /// back out of it.
    async fn copy_message(
        &self,
        from: ChatId,
        message_id: i64,
        to: ChatId,
        caption: Option<&str>,
    ) -> Result<i64, TransportError>;

    /// Re-send media by its remote reference
    async fn send_media(
        &self,
        chat: ChatId,
        media: &MediaRef,
        caption: Option<&str>,
    ) -> Result<i64, TransportError>;

    /// Download the raw bytes behind a media reference
    async fn fetch_media_bytes(&self, media: &MediaRef) -> Result<Vec<u8>, TransportError>;

    /// Upload raw bytes as fresh media
    async fn upload_bytes(
        &self,
        chat: ChatId,
        bytes: &[u8],
        kind: ContentKind,
        caption: Option<&str>,
    ) -> Result<i64, TransportError>;

    /// Whether a user is a member of the given channel
    async fn check_membership(&self, chat: ChatId, user: UserId) -> Result<bool, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(kind: ContentKind, mime: Option<&str>, name: Option<&str>) -> MediaRef {
        MediaRef {
            remote_id: "r1".to_string(),
            kind,
            file_name: name.map(str::to_string),
            mime_type: mime.map(str::to_string),
        }
    }

    #[test]
    fn test_photo_is_always_image() {
        assert!(media(ContentKind::Photo, None, None).is_image());
    }

    #[test]
    fn test_document_image_detection() {
        assert!(media(ContentKind::Document, Some("image/png"), None).is_image());
        assert!(media(ContentKind::Document, None, Some("shot.JPG")).is_image());
        assert!(!media(ContentKind::Document, Some("application/pdf"), Some("doc.pdf")).is_image());
        assert!(!media(ContentKind::Document, None, None).is_image());
    }

    #[test]
    fn test_keyboard_builder() {
        let kb = Keyboard::new()
            .row(vec![Button::new("Public", "privacy:file:c:public")])
            .row(vec![
                Button::new("Unlisted", "privacy:file:c:unlisted"),
                Button::new("Private", "privacy:file:c:private"),
            ]);
        assert_eq!(kb.rows.len(), 2);
        assert_eq!(kb.rows[1][1].payload, "privacy:file:c:private");
    }
}
