//! Proof screenshot pipeline
//!
//! After a successful redemption the user may submit a payment/usage
//! screenshot within a fixed window. Delivery into the proof channel tries a
//! chain of strategies in order and stops at the first success; transport
//! quirks (e.g. the channel not accepting forwarded media, or a stale remote
//! file reference) only surface when every rung fails.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::core_store::model::Timestamp;
use crate::messenger::{ChatId, IncomingMedia, Messenger, TransportError};

/// A live proof window for one redeemed code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofSession {
    pub code: String,
    pub category: String,
    pub expires_at: Timestamp,
}

impl ProofSession {
    pub fn new(code: String, category: String, armed_at: Timestamp, ttl_secs: u64) -> Self {
        Self {
            code,
            category,
            expires_at: armed_at.plus_secs(ttl_secs),
        }
    }

    /// Strictly after the deadline; a submission at the exact deadline
    /// second is still in the window.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProofError {
    #[error("proof must be an image (photo or image document)")]
    NotAnImage,

    #[error("all delivery strategies failed, last: {last}")]
    DeliveryFailed { last: TransportError },
}

/// One way of getting a submitted screenshot into the proof channel
#[async_trait]
pub trait ProofDelivery: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(
        &self,
        messenger: &dyn Messenger,
        channel: ChatId,
        sender: ChatId,
        media: &IncomingMedia,
        caption: &str,
    ) -> Result<(), TransportError>;
}

/// Re-post the original message into the channel, caption replaced
pub struct ForwardOriginal;

#[async_trait]
impl ProofDelivery for ForwardOriginal {
    fn name(&self) -> &'static str {
        "forward-original"
    }

    async fn deliver(
        &self,
        messenger: &dyn Messenger,
        channel: ChatId,
        sender: ChatId,
        media: &IncomingMedia,
        caption: &str,
    ) -> Result<(), TransportError> {
        messenger
            .copy_message(sender, media.message_id, channel, Some(caption))
            .await?;
        Ok(())
    }
}

/// Send the media again by its platform-side reference
pub struct ResendByReference;

#[async_trait]
impl ProofDelivery for ResendByReference {
    fn name(&self) -> &'static str {
        "resend-by-reference"
    }

    async fn deliver(
        &self,
        messenger: &dyn Messenger,
        channel: ChatId,
        _sender: ChatId,
        media: &IncomingMedia,
        caption: &str,
    ) -> Result<(), TransportError> {
        messenger
            .send_media(channel, &media.media, Some(caption))
            .await?;
        Ok(())
    }
}

/// Download the raw bytes and upload them as a fresh file
pub struct ReuploadBytes;

#[async_trait]
impl ProofDelivery for ReuploadBytes {
    fn name(&self) -> &'static str {
        "reupload-bytes"
    }

    async fn deliver(
        &self,
        messenger: &dyn Messenger,
        channel: ChatId,
        _sender: ChatId,
        media: &IncomingMedia,
        caption: &str,
    ) -> Result<(), TransportError> {
        let bytes = messenger.fetch_media_bytes(&media.media).await?;
        messenger
            .upload_bytes(channel, &bytes, media.media.kind, Some(caption))
            .await?;
        Ok(())
    }
}

/// Ordered chain of delivery strategies
pub struct ProofPipeline {
    strategies: Vec<Box<dyn ProofDelivery>>,
}

impl ProofPipeline {
    /// The standard chain: forward, resend by reference, reupload bytes
    pub fn standard() -> Self {
        Self {
            strategies: vec![
                Box::new(ForwardOriginal),
                Box::new(ResendByReference),
                Box::new(ReuploadBytes),
            ],
        }
    }

    pub fn with_strategies(strategies: Vec<Box<dyn ProofDelivery>>) -> Self {
        Self { strategies }
    }

    /// Run the chain until one strategy lands the screenshot.
    ///
    /// Rejects non-image media up front; the caller keeps the session alive
    /// in that case so the user can resubmit.
    pub async fn deliver(
        &self,
        messenger: &dyn Messenger,
        channel: ChatId,
        sender: ChatId,
        media: &IncomingMedia,
        caption: &str,
    ) -> Result<&'static str, ProofError> {
        if !media.media.is_image() {
            return Err(ProofError::NotAnImage);
        }

        let mut last: Option<TransportError> = None;
        for strategy in &self.strategies {
            match strategy.deliver(messenger, channel, sender, media, caption).await {
                Ok(()) => {
                    info!(strategy = strategy.name(), "proof delivered");
                    return Ok(strategy.name());
                }
                Err(err) => {
                    warn!(strategy = strategy.name(), error = %err, "proof delivery attempt failed");
                    last = Some(err);
                }
            }
        }

        Err(ProofError::DeliveryFailed {
            last: last.unwrap_or_else(|| TransportError("no delivery strategies configured".into())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_store::model::{ContentKind, UserId};
    use crate::messenger::{Keyboard, MediaRef};
    use std::sync::Mutex;

    /// Scripted transport: each operation fails while its flag is set and
    /// records the calls it receives.
    #[derive(Default)]
    struct ScriptedMessenger {
        fail_copy: bool,
        fail_send_media: bool,
        fail_fetch: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl Messenger for ScriptedMessenger {
        async fn send_message(&self, _chat: ChatId, _text: &str) -> Result<(), TransportError> {
            Ok(())
        }

        async fn send_keyboard(
            &self,
            _chat: ChatId,
            _text: &str,
            _keyboard: Keyboard,
        ) -> Result<(), TransportError> {
            Ok(())
        }

        async fn copy_message(
            &self,
            _from: ChatId,
            _message_id: i64,
            _to: ChatId,
            _caption: Option<&str>,
        ) -> Result<i64, TransportError> {
            self.calls.lock().unwrap().push("copy");
            if self.fail_copy {
                Err(TransportError("copy rejected".into()))
            } else {
                Ok(10)
            }
        }

        async fn send_media(
            &self,
            _chat: ChatId,
            _media: &MediaRef,
            _caption: Option<&str>,
        ) -> Result<i64, TransportError> {
            self.calls.lock().unwrap().push("send_media");
            if self.fail_send_media {
                Err(TransportError("stale reference".into()))
            } else {
                Ok(11)
            }
        }

        async fn fetch_media_bytes(&self, _media: &MediaRef) -> Result<Vec<u8>, TransportError> {
            self.calls.lock().unwrap().push("fetch");
            if self.fail_fetch {
                Err(TransportError("download failed".into()))
            } else {
                Ok(vec![0xff, 0xd8])
            }
        }

        async fn upload_bytes(
            &self,
            _chat: ChatId,
            _bytes: &[u8],
            _kind: ContentKind,
            _caption: Option<&str>,
        ) -> Result<i64, TransportError> {
            self.calls.lock().unwrap().push("upload");
            Ok(12)
        }

        async fn check_membership(
            &self,
            _chat: ChatId,
            _user: UserId,
        ) -> Result<bool, TransportError> {
            Ok(true)
        }
    }

    fn photo_submission() -> IncomingMedia {
        IncomingMedia {
            message_id: 42,
            media: MediaRef {
                remote_id: "ph-1".into(),
                kind: ContentKind::Photo,
                file_name: None,
                mime_type: None,
            },
            caption: None,
        }
    }

    const CHANNEL: ChatId = ChatId(-100);
    const SENDER: ChatId = ChatId(7);

    #[tokio::test]
    async fn test_first_strategy_short_circuits() {
        let messenger = ScriptedMessenger::default();
        let pipeline = ProofPipeline::standard();
        let used = pipeline
            .deliver(&messenger, CHANNEL, SENDER, &photo_submission(), "cap")
            .await
            .unwrap();
        assert_eq!(used, "forward-original");
        assert_eq!(*messenger.calls.lock().unwrap(), vec!["copy"]);
    }

    #[tokio::test]
    async fn test_falls_through_to_reupload() {
        let messenger = ScriptedMessenger {
            fail_copy: true,
            fail_send_media: true,
            ..Default::default()
        };
        let pipeline = ProofPipeline::standard();
        let used = pipeline
            .deliver(&messenger, CHANNEL, SENDER, &photo_submission(), "cap")
            .await
            .unwrap();
        assert_eq!(used, "reupload-bytes");
        assert_eq!(
            *messenger.calls.lock().unwrap(),
            vec!["copy", "send_media", "fetch", "upload"]
        );
    }

    #[tokio::test]
    async fn test_all_failures_report_last_error() {
        let messenger = ScriptedMessenger {
            fail_copy: true,
            fail_send_media: true,
            fail_fetch: true,
            ..Default::default()
        };
        let pipeline = ProofPipeline::standard();
        let err = pipeline
            .deliver(&messenger, CHANNEL, SENDER, &photo_submission(), "cap")
            .await
            .unwrap_err();
        match err {
            ProofError::DeliveryFailed { last } => {
                assert!(last.to_string().contains("download failed"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_image_rejected_before_any_attempt() {
        let messenger = ScriptedMessenger::default();
        let pipeline = ProofPipeline::standard();
        let submission = IncomingMedia {
            message_id: 43,
            media: MediaRef {
                remote_id: "doc-1".into(),
                kind: ContentKind::Document,
                file_name: Some("receipt.pdf".into()),
                mime_type: Some("application/pdf".into()),
            },
            caption: None,
        };
        let err = pipeline
            .deliver(&messenger, CHANNEL, SENDER, &submission, "cap")
            .await
            .unwrap_err();
        assert!(matches!(err, ProofError::NotAnImage));
        assert!(messenger.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_session_window_boundaries() {
        let session = ProofSession::new("c".into(), "Premium".into(), Timestamp(100), 600);
        assert!(!session.is_expired(Timestamp(699)));
        assert!(!session.is_expired(Timestamp(700)));
        assert!(session.is_expired(Timestamp(701)));
    }
}
