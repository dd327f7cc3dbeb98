//! Console transport
//!
//! A local stand-in for a real chat network, useful for exercising the
//! engine by hand. Outbound calls print to stdout; inbound lines are
//! classified with a small meta-syntax:
//!
//!   /command args      a slash command
//!   !press <payload>   an inline-button press
//!   !photo <id>        a photo upload with the given remote id
//!   !file <name>       a document upload named <name>
//!   anything else      plain text

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dropgate_core::core_store::model::{ContentKind, UserId};
use dropgate_core::messenger::{
    ChatId, EventPayload, InboundEvent, IncomingMedia, Keyboard, MediaRef, Messenger,
    TransportError,
};

pub struct ConsoleMessenger {
    next_msg_id: AtomicI64,
}

impl ConsoleMessenger {
    pub fn new() -> Self {
        Self {
            next_msg_id: AtomicI64::new(1),
        }
    }

    fn next_id(&self) -> i64 {
        self.next_msg_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for ConsoleMessenger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Messenger for ConsoleMessenger {
    async fn send_message(&self, chat: ChatId, text: &str) -> Result<(), TransportError> {
        println!("[{chat}] {text}");
        Ok(())
    }

    async fn send_keyboard(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Keyboard,
    ) -> Result<(), TransportError> {
        println!("[{chat}] {text}");
        for row in &keyboard.rows {
            let rendered: Vec<String> = row
                .iter()
                .map(|b| format!("[{} => !press {}]", b.label, b.payload))
                .collect();
            println!("[{chat}]   {}", rendered.join(" "));
        }
        Ok(())
    }

    async fn copy_message(
        &self,
        from: ChatId,
        message_id: i64,
        to: ChatId,
        caption: Option<&str>,
    ) -> Result<i64, TransportError> {
        let new_id = self.next_id();
        println!(
            "[{to}] (copy of {from}/{message_id} as {new_id}){}",
            caption.map(|c| format!(" {c}")).unwrap_or_default()
        );
        Ok(new_id)
    }

    async fn send_media(
        &self,
        chat: ChatId,
        media: &MediaRef,
        caption: Option<&str>,
    ) -> Result<i64, TransportError> {
        let new_id = self.next_id();
        println!(
            "[{chat}] (media {} as {new_id}){}",
            media.remote_id,
            caption.map(|c| format!(" {c}")).unwrap_or_default()
        );
        Ok(new_id)
    }

    async fn fetch_media_bytes(&self, media: &MediaRef) -> Result<Vec<u8>, TransportError> {
        // Nothing real behind a console reference.
        Ok(media.remote_id.as_bytes().to_vec())
    }

    async fn upload_bytes(
        &self,
        chat: ChatId,
        bytes: &[u8],
        _kind: ContentKind,
        caption: Option<&str>,
    ) -> Result<i64, TransportError> {
        let new_id = self.next_id();
        println!(
            "[{chat}] (upload of {} bytes as {new_id}){}",
            bytes.len(),
            caption.map(|c| format!(" {c}")).unwrap_or_default()
        );
        Ok(new_id)
    }

    async fn check_membership(&self, _chat: ChatId, _user: UserId) -> Result<bool, TransportError> {
        Ok(true)
    }
}

/// Turn one console line into an inbound event
pub fn classify_line(sender: UserId, sender_name: &str, line: &str, msg_id: i64) -> InboundEvent {
    let payload = if let Some(rest) = line.strip_prefix('/') {
        let mut parts = rest.splitn(2, ' ');
        let name = parts.next().unwrap_or_default().to_string();
        let args = parts.next().unwrap_or_default().to_string();
        EventPayload::Command { name, args }
    } else if let Some(rest) = line.strip_prefix("!press ") {
        EventPayload::ButtonPress(rest.trim().to_string())
    } else if let Some(rest) = line.strip_prefix("!photo ") {
        EventPayload::Media(IncomingMedia {
            message_id: msg_id,
            media: MediaRef {
                remote_id: rest.trim().to_string(),
                kind: ContentKind::Photo,
                file_name: None,
                mime_type: None,
            },
            caption: None,
        })
    } else if let Some(rest) = line.strip_prefix("!file ") {
        let name = rest.trim().to_string();
        EventPayload::Media(IncomingMedia {
            message_id: msg_id,
            media: MediaRef {
                remote_id: format!("doc-{name}"),
                kind: ContentKind::Document,
                file_name: Some(name),
                mime_type: None,
            },
            caption: None,
        })
    } else {
        EventPayload::Text(line.to_string())
    };

    InboundEvent {
        sender,
        sender_name: sender_name.to_string(),
        payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_command() {
        let event = classify_line(UserId(1), "me", "/ban 42 reason", 1);
        match event.payload {
            EventPayload::Command { name, args } => {
                assert_eq!(name, "ban");
                assert_eq!(args, "42 reason");
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_classify_button_press() {
        let event = classify_line(UserId(1), "me", "!press privacy:file:abc:public", 1);
        match event.payload {
            EventPayload::ButtonPress(payload) => {
                assert_eq!(payload, "privacy:file:abc:public")
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_classify_media_and_text() {
        let event = classify_line(UserId(1), "me", "!photo shot-1", 7);
        match event.payload {
            EventPayload::Media(media) => {
                assert_eq!(media.message_id, 7);
                assert_eq!(media.media.kind, ContentKind::Photo);
            }
            other => panic!("unexpected payload: {other:?}"),
        }

        let event = classify_line(UserId(1), "me", "just a code", 8);
        assert!(matches!(event.payload, EventPayload::Text(t) if t == "just a code"));
    }
}
