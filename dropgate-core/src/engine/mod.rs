//! Event router
//!
//! One `Engine` instance owns the store, the session registry, and the
//! transport. Inbound events are routed to whichever flow currently owns the
//! sender (proof session, wizard, unlisted prompt) before falling back to
//! command / upload / code handling. A handler failure is logged and never
//! affects other users' in-flight state.

pub mod commands;
pub mod format;
pub mod serve;

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::Config;
use crate::core_access::AccessMode;
use crate::core_flow::{CodeKind, ProofError, ProofPipeline, ProofSession, SessionRegistry, UnlistedPrompt, WizardStep};
use crate::core_store::model::{Timestamp, UserId, UNLIMITED_USES};
use crate::core_store::{EntityStore, ShareableKind, StoreError};
use crate::messenger::{ChatId, EventPayload, InboundEvent, IncomingMedia, Messenger, TransportError};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Transport(#[from] TransportError),
}

pub struct Engine {
    pub(crate) store: EntityStore,
    pub(crate) sessions: SessionRegistry,
    pub(crate) messenger: Arc<dyn Messenger>,
    pub(crate) config: Config,
    pub(crate) proof_pipeline: ProofPipeline,
}

impl Engine {
    pub fn new(store: EntityStore, messenger: Arc<dyn Messenger>, config: Config) -> Self {
        Self {
            store,
            sessions: SessionRegistry::new(),
            messenger,
            config,
            proof_pipeline: ProofPipeline::standard(),
        }
    }

    /// Handle one inbound event, absorbing its failure
    pub async fn handle_event(&self, event: InboundEvent) {
        if let Err(err) = self.dispatch(&event).await {
            error!(sender = %event.sender, error = %err, "event handling failed");
        }
    }

    async fn dispatch(&self, event: &InboundEvent) -> Result<(), EngineError> {
        let sender = event.sender;
        let chat = ChatId::from(sender);

        if self.store.register_user(sender).await? {
            info!(user = %sender, name = event.sender_name, "new user");
            if let Some(data_channel) = self.config.channels.data_channel_id {
                let notice = format!("New user: {} ({})", event.sender_name, sender);
                if let Err(err) = self
                    .messenger
                    .send_message(ChatId(data_channel), &notice)
                    .await
                {
                    warn!(error = %err, "new-user notice failed");
                }
            }
        }

        if self.store.is_banned(sender).await {
            self.messenger.send_message(chat, "You are banned.").await?;
            return Ok(());
        }

        match &event.payload {
            EventPayload::Command { name, args } => {
                self.handle_command(sender, name, args).await
            }
            EventPayload::ButtonPress(payload) => self.handle_button(sender, payload).await,
            EventPayload::Media(media) => {
                let now = Timestamp::now();
                match self.sessions.peek_proof(sender, now).await {
                    Some(session) => {
                        self.handle_proof_submission(sender, &event.sender_name, &session, media)
                            .await
                    }
                    None => self.handle_upload(sender, &event.sender_name, media).await,
                }
            }
            EventPayload::Text(text) => self.handle_text(sender, text).await,
        }
    }

    async fn handle_button(&self, sender: UserId, payload: &str) -> Result<(), EngineError> {
        let chat = ChatId::from(sender);

        if let Some(category) = payload.strip_prefix("cat_") {
            if !self.store.has_category(category).await {
                self.messenger
                    .send_message(chat, "That category no longer exists.")
                    .await?;
                return Ok(());
            }
            self.sessions.start_wizard(sender, category.to_string()).await;
            self.messenger
                .send_message(
                    chat,
                    &format!("Creating codes for '{category}'. Send the accounts, one per line:"),
                )
                .await?;
            return Ok(());
        }

        if let Some(kind) = payload.strip_prefix("code_type_") {
            let Some(kind) = CodeKind::parse(kind) else {
                warn!(payload, "unknown code-kind payload");
                return Ok(());
            };
            if !self.sessions.wizard_choose_kind(sender, kind).await {
                self.messenger
                    .send_message(chat, "No code wizard in progress. Start with /add.")
                    .await?;
                return Ok(());
            }
            let prompt = match kind {
                CodeKind::Custom => "Send the code text (4-24 letters, digits, - or _):",
                CodeKind::Time => "Send the validity in hours:",
                CodeKind::Limit => "Send the maximum number of redemptions:",
            };
            self.messenger.send_message(chat, prompt).await?;
            return Ok(());
        }

        if let Some(code) = payload.strip_prefix("proof_") {
            let Some(entry) = self.store.get_code(code).await else {
                self.messenger.send_message(chat, "Unknown code.").await?;
                return Ok(());
            };
            let ttl = self.config.access.proof_ttl.as_secs();
            let session =
                ProofSession::new(code.to_string(), entry.category, Timestamp::now(), ttl);
            self.sessions.set_proof(sender, session).await;
            self.messenger
                .send_message(
                    chat,
                    &format!(
                        "Send your screenshot within {} minutes.",
                        ttl / 60
                    ),
                )
                .await?;
            return Ok(());
        }

        if let Some(rest) = payload.strip_prefix("privacy:") {
            return self.handle_privacy_button(sender, rest).await;
        }

        warn!(payload, "unrecognized button payload");
        Ok(())
    }

    /// `<kind>:<code>:<mode>` from a privacy keyboard
    async fn handle_privacy_button(&self, sender: UserId, rest: &str) -> Result<(), EngineError> {
        let chat = ChatId::from(sender);
        let mut parts = rest.splitn(3, ':');
        let (Some(kind), Some(code), Some(mode)) = (parts.next(), parts.next(), parts.next())
        else {
            warn!(rest, "malformed privacy payload");
            return Ok(());
        };
        let Some(kind) = ShareableKind::parse(kind) else {
            warn!(rest, "malformed privacy payload");
            return Ok(());
        };

        if mode == "unlisted" {
            self.sessions
                .set_unlisted_prompt(
                    sender,
                    UnlistedPrompt {
                        kind: kind.as_str().to_string(),
                        code: code.to_string(),
                    },
                )
                .await;
            self.messenger
                .send_message(chat, "How many viewers may open it? (0 = unlimited)")
                .await?;
            return Ok(());
        }

        let Some(mode) = AccessMode::parse(mode) else {
            warn!(rest, "malformed privacy payload");
            return Ok(());
        };
        match self.store.set_access_mode(kind, code, sender, mode).await {
            Ok(()) => {
                self.messenger
                    .send_message(chat, &format!("Visibility set to {mode}."))
                    .await?;
            }
            Err(StoreError::NotPermitted) => {
                self.messenger
                    .send_message(chat, "Only the owner can change this.")
                    .await?;
            }
            Err(StoreError::NotFound(_)) => {
                self.messenger.send_message(chat, "Unknown code.").await?;
            }
            Err(other) => return Err(other.into()),
        }
        Ok(())
    }

    async fn handle_text(&self, sender: UserId, text: &str) -> Result<(), EngineError> {
        let now = Timestamp::now();

        if let Some(result) = self.sessions.wizard_handle_text(sender, text, now).await {
            return self.apply_wizard_result(sender, result).await;
        }

        if let Some(prompt) = self.sessions.peek_unlisted_prompt(sender).await {
            return self.apply_unlisted_reply(sender, &prompt, text).await;
        }

        self.resolve_code(sender, text.trim()).await
    }

    async fn apply_wizard_result(
        &self,
        sender: UserId,
        result: Result<WizardStep, crate::core_flow::WizardError>,
    ) -> Result<(), EngineError> {
        let chat = ChatId::from(sender);
        let step = match result {
            Ok(step) => step,
            Err(err) => {
                // Recoverable input problem; stage unchanged, re-prompt.
                self.messenger.send_message(chat, &err.to_string()).await?;
                return Ok(());
            }
        };

        match step {
            WizardStep::AccountsAccepted { count } => {
                self.messenger
                    .send_keyboard(
                        chat,
                        &format!("{count} account(s) collected. Pick the code type:"),
                        format::code_kind_keyboard(),
                    )
                    .await?;
            }
            WizardStep::MintCustom {
                code,
                category,
                account,
                dropped,
            } => {
                match self
                    .store
                    .create_custom_code(code.clone(), category, account, sender)
                    .await
                {
                    Ok(entry) => {
                        self.sessions.clear_wizard(sender).await;
                        if dropped > 0 {
                            self.messenger
                                .send_message(
                                    chat,
                                    &format!(
                                        "A custom code holds one account; {dropped} extra dropped."
                                    ),
                                )
                                .await?;
                        }
                        info!(user = %sender, code = entry.code, "custom code created");
                        self.messenger
                            .send_message(chat, &format!("Custom code created: {}", entry.code))
                            .await?;
                    }
                    Err(StoreError::CodeTaken(_)) => {
                        // Collision ends the wizard; the caller restarts it.
                        self.sessions.clear_wizard(sender).await;
                        self.messenger
                            .send_message(
                                chat,
                                &format!("'{code}' is already taken. Start again with /add."),
                            )
                            .await?;
                    }
                    Err(other) => return Err(other.into()),
                }
            }
            WizardStep::MintTimed {
                category,
                accounts,
                expires_at,
            } => {
                let made = self
                    .store
                    .create_generated_codes(category, accounts, UNLIMITED_USES, Some(expires_at), sender)
                    .await?;
                self.sessions.clear_wizard(sender).await;
                info!(user = %sender, count = made.len(), "timed codes created");
                self.messenger
                    .send_message(chat, &format::minted_codes_summary(&made))
                    .await?;
            }
            WizardStep::MintLimited {
                category,
                accounts,
                max_uses,
            } => {
                let made = self
                    .store
                    .create_generated_codes(category, accounts, max_uses, None, sender)
                    .await?;
                self.sessions.clear_wizard(sender).await;
                info!(user = %sender, count = made.len(), "limited codes created");
                self.messenger
                    .send_message(chat, &format::minted_codes_summary(&made))
                    .await?;
            }
        }
        Ok(())
    }

    async fn apply_unlisted_reply(
        &self,
        sender: UserId,
        prompt: &UnlistedPrompt,
        text: &str,
    ) -> Result<(), EngineError> {
        let chat = ChatId::from(sender);
        let Ok(n) = text.trim().parse::<u64>() else {
            // Invalid reply keeps the prompt armed.
            self.messenger
                .send_message(chat, "Send a whole number (0 = unlimited).")
                .await?;
            return Ok(());
        };
        let Some(kind) = ShareableKind::parse(&prompt.kind) else {
            warn!(kind = prompt.kind, "stale unlisted prompt kind");
            self.sessions.clear_unlisted_prompt(sender).await;
            return Ok(());
        };

        let limit = if n == 0 { None } else { Some(n) };
        match self.store.set_unlisted(kind, &prompt.code, sender, limit).await {
            Ok(()) => {
                self.sessions.clear_unlisted_prompt(sender).await;
                let text = match limit {
                    Some(n) => format!("Unlisted: first {n} viewers may open it."),
                    None => "Unlisted: anyone with the link may open it.".to_string(),
                };
                self.messenger.send_message(chat, &text).await?;
            }
            Err(StoreError::NotPermitted) => {
                self.sessions.clear_unlisted_prompt(sender).await;
                self.messenger
                    .send_message(chat, "Only the owner can change this.")
                    .await?;
            }
            Err(StoreError::NotFound(_)) => {
                self.sessions.clear_unlisted_prompt(sender).await;
                self.messenger.send_message(chat, "Unknown code.").await?;
            }
            Err(other) => return Err(other.into()),
        }
        Ok(())
    }

    async fn handle_proof_submission(
        &self,
        sender: UserId,
        sender_name: &str,
        session: &ProofSession,
        media: &IncomingMedia,
    ) -> Result<(), EngineError> {
        let chat = ChatId::from(sender);
        let channel = ChatId(self.config.channels.proof_channel_id);
        let caption = format::proof_caption(
            sender_name,
            sender,
            &session.code,
            &session.category,
            Timestamp::now(),
        );

        match self
            .proof_pipeline
            .deliver(self.messenger.as_ref(), channel, chat, media, &caption)
            .await
        {
            Ok(strategy) => {
                self.sessions.clear_proof(sender).await;
                info!(user = %sender, code = session.code, strategy, "proof accepted");
                self.messenger
                    .send_message(chat, "Proof received, thank you!")
                    .await?;
            }
            Err(ProofError::NotAnImage) => {
                // Session stays armed; the user may retry with an image.
                self.messenger
                    .send_message(chat, "Please send an image screenshot.")
                    .await?;
            }
            Err(ProofError::DeliveryFailed { last }) => {
                self.sessions.clear_proof(sender).await;
                self.messenger
                    .send_message(chat, &format::proof_failure_diagnostic(&last.to_string()))
                    .await?;
            }
        }
        Ok(())
    }
}
