//! Upload intake and code retrieval
//!
//! Uploads are persisted by copying the message into the store channel; the
//! returned message id is the storage reference. Retrieval runs every
//! release through the access policy and charges unlisted quota only after
//! the content actually went out.

use tracing::{info, warn};

use crate::core_access::{AccessDecision, DeniedReason};
use crate::core_flow::{redeem, RedeemOutcome, RedemptionGate};
use crate::core_store::model::{StoredFile, Timestamp, UserId};
use crate::core_store::ShareableKind;
use crate::messenger::{ChatId, IncomingMedia};

use super::format;
use super::{Engine, EngineError};

impl Engine {
    /// Store an uploaded file and hand back its share code.
    ///
    /// With a bundle session open the code is appended there instead of
    /// producing the standalone confirmation.
    pub(crate) async fn handle_upload(
        &self,
        sender: UserId,
        sender_name: &str,
        media: &IncomingMedia,
    ) -> Result<(), EngineError> {
        let chat = ChatId::from(sender);
        let code = self.store.generate_unique_code().await;
        let caption = format::store_caption(&code, sender_name, sender);

        let store_channel = ChatId(self.config.channels.store_channel_id);
        let store_msg_id = self
            .messenger
            .copy_message(chat, media.message_id, store_channel, Some(&caption))
            .await?;

        let file = StoredFile::new(
            code.clone(),
            sender,
            store_msg_id,
            media.media.kind,
            media.caption.clone().unwrap_or_default(),
            Timestamp::now(),
        );
        self.store.insert_file(file).await?;
        info!(owner = %sender, code, "file stored");

        if let Some(count) = self.sessions.append_bundle_item(sender, code.clone()).await {
            self.messenger
                .send_message(chat, &format!("Added to bundle ({count} item(s)). /finish when done."))
                .await?;
            return Ok(());
        }

        let link = format::share_link(&self.config.channels.link_base, &code);
        self.messenger
            .send_keyboard(
                chat,
                &format::upload_confirmation(&link, &code),
                format::privacy_keyboard(ShareableKind::File, &code),
            )
            .await?;
        Ok(())
    }

    /// Resolve a bare code or deep-link payload: file, bundle, or redeem
    /// code, in that order.
    pub(crate) async fn resolve_code(
        &self,
        sender: UserId,
        code: &str,
    ) -> Result<(), EngineError> {
        if self.store.get_file(code).await.is_some() {
            return self.serve_file(sender, code).await;
        }
        if self.store.get_bundle(code).await.is_some() {
            return self.serve_bundle(sender, code).await;
        }
        self.attempt_redeem(sender, code).await
    }

    pub(crate) async fn serve_file(&self, requester: UserId, code: &str) -> Result<(), EngineError> {
        let chat = ChatId::from(requester);
        let Some(file) = self.store.get_file(code).await else {
            self.messenger.send_message(chat, "Unknown code.").await?;
            return Ok(());
        };

        match file.access.evaluate(file.owner, requester) {
            AccessDecision::Allowed => {}
            AccessDecision::Denied(reason) => {
                self.messenger
                    .send_message(chat, &denial_text(reason))
                    .await?;
                return Ok(());
            }
        }

        let store_channel = ChatId(self.config.channels.store_channel_id);
        let caption = (file.content_kind.supports_caption() && !file.caption.is_empty())
            .then(|| file.caption.as_str());
        self.messenger
            .copy_message(store_channel, file.store_msg_id, chat, caption)
            .await?;
        self.store
            .record_view(ShareableKind::File, code, requester)
            .await?;
        Ok(())
    }

    /// Serve every item of a bundle, skipping dangling references and
    /// reporting what was skipped.
    pub(crate) async fn serve_bundle(
        &self,
        requester: UserId,
        code: &str,
    ) -> Result<(), EngineError> {
        let chat = ChatId::from(requester);
        let Some(bundle) = self.store.get_bundle(code).await else {
            self.messenger.send_message(chat, "Unknown code.").await?;
            return Ok(());
        };

        match bundle.access.evaluate(bundle.owner, requester) {
            AccessDecision::Allowed => {}
            AccessDecision::Denied(reason) => {
                self.messenger
                    .send_message(chat, &denial_text(reason))
                    .await?;
                return Ok(());
            }
        }

        let store_channel = ChatId(self.config.channels.store_channel_id);
        let mut delivered = 0usize;
        let mut failed = 0usize;
        for item in &bundle.items {
            let Some(file) = self.store.get_file(item).await else {
                warn!(bundle = code, item, "bundle item vanished");
                failed += 1;
                continue;
            };
            let caption = (file.content_kind.supports_caption() && !file.caption.is_empty())
                .then(|| file.caption.as_str());
            match self
                .messenger
                .copy_message(store_channel, file.store_msg_id, chat, caption)
                .await
            {
                Ok(_) => delivered += 1,
                Err(err) => {
                    warn!(bundle = code, item, error = %err, "bundle item delivery failed");
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            self.messenger
                .send_message(
                    chat,
                    &format!("{delivered} item(s) delivered, {failed} could not be sent."),
                )
                .await?;
        }
        if delivered > 0 {
            self.store
                .record_view(ShareableKind::Bundle, code, requester)
                .await?;
        }
        Ok(())
    }

    /// Run the redemption chain and, on success, offer the proof follow-up.
    pub(crate) async fn attempt_redeem(
        &self,
        sender: UserId,
        code: &str,
    ) -> Result<(), EngineError> {
        let chat = ChatId::from(sender);
        let gate = RedemptionGate {
            channel: ChatId(self.config.channels.force_join_channel_id),
            join_link: &self.config.channels.force_join_link,
        };
        let outcome = redeem(
            &self.store,
            self.messenger.as_ref(),
            gate,
            sender,
            code,
            Timestamp::now(),
        )
        .await?;

        match outcome {
            RedeemOutcome::Granted(grant) => {
                // The grant is already persisted; the reveal can fail
                // without corrupting the accounting.
                let entry = self.store.get_code(code).await;
                let text = match entry {
                    Some(entry) => format::redeem_reveal(&entry),
                    None => format!("Code accepted!\nAccount:\n{}", grant.account),
                };
                self.messenger
                    .send_keyboard(chat, &text, format::proof_offer_keyboard(code))
                    .await?;

                if let Some(data_channel) = self.config.channels.data_channel_id {
                    let notice = format!(
                        "New redemption!\nUser: {sender}\nCode: {code}\nCategory: {}",
                        grant.category
                    );
                    if let Err(err) = self
                        .messenger
                        .send_message(ChatId(data_channel), &notice)
                        .await
                    {
                        warn!(error = %err, "redemption notice failed");
                    }
                }
            }
            RedeemOutcome::Banned => {
                self.messenger.send_message(chat, "You are banned.").await?;
            }
            RedeemOutcome::JoinRequired { link } => {
                self.messenger
                    .send_message(chat, &format!("Join our channel first, then retry:\n{link}"))
                    .await?;
            }
            RedeemOutcome::Invalid => {
                self.messenger.send_message(chat, "Unknown code.").await?;
            }
            RedeemOutcome::Expired => {
                self.messenger
                    .send_message(chat, "This code has expired.")
                    .await?;
            }
            RedeemOutcome::UsageLimitReached => {
                self.messenger
                    .send_message(chat, "This code has reached its usage limit.")
                    .await?;
            }
        }
        Ok(())
    }
}

fn denial_text(reason: DeniedReason) -> String {
    match reason {
        DeniedReason::OwnerOnly => "This content is private.".to_string(),
        DeniedReason::QuotaExhausted => {
            "This link has reached its viewer limit.".to_string()
        }
    }
}
