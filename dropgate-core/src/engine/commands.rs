//! Slash-command handlers

use tracing::{info, warn};

use crate::core_store::model::{Timestamp, UserId};
use crate::core_store::ShareableKind;
use crate::messenger::ChatId;

use super::format;
use super::{Engine, EngineError};

impl Engine {
    pub(crate) async fn handle_command(
        &self,
        sender: UserId,
        name: &str,
        args: &str,
    ) -> Result<(), EngineError> {
        let chat = ChatId::from(sender);
        match name {
            "start" => {
                let payload = args.trim();
                if payload.is_empty() {
                    self.messenger
                        .send_message(chat, &format::welcome_text())
                        .await?;
                } else {
                    self.resolve_code(sender, payload).await?;
                }
            }
            "help" => {
                self.messenger.send_message(chat, &format::help_text()).await?;
            }
            "add" => {
                // Code creation is open to every non-banned user.
                let categories = self.store.categories().await;
                self.messenger
                    .send_keyboard(
                        chat,
                        "Pick a category for the new codes:",
                        format::category_keyboard(&categories),
                    )
                    .await?;
            }
            "bundle" => {
                self.sessions.open_bundle(sender).await;
                self.messenger
                    .send_message(
                        chat,
                        "Bundle started. Send files one by one, then /finish (or /cancel).",
                    )
                    .await?;
            }
            "finish" => self.finish_bundle(sender).await?,
            "cancel" => self.cancel_sessions(sender).await?,
            "myfiles" => self.list_owned(sender).await?,
            "stats" => {
                if !self.require_admin(sender).await? {
                    return Ok(());
                }
                let stats = self.store.stats().await;
                self.messenger
                    .send_message(chat, &format::stats_text(&stats))
                    .await?;
            }
            "ban" => {
                if !self.require_admin(sender).await? {
                    return Ok(());
                }
                match parse_user_arg(args) {
                    Some(target) => {
                        self.store.ban_user(target).await?;
                        info!(admin = %sender, target = %target, "user banned");
                        self.messenger
                            .send_message(chat, &format!("Banned {target}."))
                            .await?;
                    }
                    None => {
                        self.messenger
                            .send_message(chat, "Usage: /ban <user id>")
                            .await?;
                    }
                }
            }
            "unban" => {
                if !self.require_admin(sender).await? {
                    return Ok(());
                }
                match parse_user_arg(args) {
                    Some(target) => {
                        self.store.unban_user(target).await?;
                        self.messenger
                            .send_message(chat, &format!("Unbanned {target}."))
                            .await?;
                    }
                    None => {
                        self.messenger
                            .send_message(chat, "Usage: /unban <user id>")
                            .await?;
                    }
                }
            }
            "addadmin" => {
                // Promotion is reserved for the configured admins.
                if !self.store.is_main_admin(sender) {
                    self.messenger
                        .send_message(chat, "Only main admins can promote.")
                        .await?;
                    return Ok(());
                }
                match parse_user_arg(args) {
                    Some(target) => {
                        self.store.add_admin(target).await?;
                        self.messenger
                            .send_message(chat, &format!("{target} is now an admin."))
                            .await?;
                    }
                    None => {
                        self.messenger
                            .send_message(chat, "Usage: /addadmin <user id>")
                            .await?;
                    }
                }
            }
            "adminlist" => {
                if !self.require_admin(sender).await? {
                    return Ok(());
                }
                let (main, extra) = self.store.admin_lists().await;
                let mut text = String::from("Main admins:\n");
                for id in main {
                    text.push_str(&format!("  {id}\n"));
                }
                text.push_str("Admins:\n");
                for id in extra {
                    text.push_str(&format!("  {id}\n"));
                }
                self.messenger.send_message(chat, &text).await?;
            }
            "addcat" => {
                if !self.require_admin(sender).await? {
                    return Ok(());
                }
                let name = args.trim();
                if name.is_empty() {
                    self.messenger
                        .send_message(chat, "Usage: /addcat <name>")
                        .await?;
                } else if self.store.add_category(name.to_string()).await? {
                    self.messenger
                        .send_message(chat, &format!("Category '{name}' added."))
                        .await?;
                } else {
                    self.messenger
                        .send_message(chat, &format!("Category '{name}' already exists."))
                        .await?;
                }
            }
            "delcat" => {
                if !self.require_admin(sender).await? {
                    return Ok(());
                }
                let name = args.trim();
                if name.is_empty() {
                    self.messenger
                        .send_message(chat, "Usage: /delcat <name>")
                        .await?;
                } else if self.store.remove_category(name).await? {
                    self.messenger
                        .send_message(chat, &format!("Category '{name}' removed."))
                        .await?;
                } else {
                    self.messenger
                        .send_message(chat, &format!("No category named '{name}'."))
                        .await?;
                }
            }
            "broadcast" => {
                if !self.require_admin(sender).await? {
                    return Ok(());
                }
                let text = args.trim();
                if text.is_empty() {
                    self.messenger
                        .send_message(chat, "Usage: /broadcast <message>")
                        .await?;
                } else {
                    self.broadcast(sender, text).await?;
                }
            }
            other => {
                self.messenger
                    .send_message(chat, &format!("Unknown command: /{other}"))
                    .await?;
            }
        }
        Ok(())
    }

    /// Fan a message out to every known user. Per-recipient failures are
    /// expected (blocked bots, deleted accounts) and only tallied.
    async fn broadcast(&self, sender: UserId, text: &str) -> Result<(), EngineError> {
        let users = self.store.known_users().await;
        let total = users.len();
        let mut failed = 0usize;
        for user in users {
            if let Err(err) = self.messenger.send_message(ChatId::from(user), text).await {
                warn!(recipient = %user, error = %err, "broadcast delivery failed");
                failed += 1;
            }
        }
        self.messenger
            .send_message(
                ChatId::from(sender),
                &format!("Broadcast done: {} delivered, {failed} failed.", total - failed),
            )
            .await?;
        Ok(())
    }

    async fn finish_bundle(&self, sender: UserId) -> Result<(), EngineError> {
        let chat = ChatId::from(sender);
        let Some(items) = self.sessions.bundle_items(sender).await else {
            self.messenger
                .send_message(chat, "No bundle in progress. Start one with /bundle.")
                .await?;
            return Ok(());
        };
        if items.is_empty() {
            self.messenger
                .send_message(chat, "The bundle is empty. Send some files first.")
                .await?;
            return Ok(());
        }

        let bundle = self
            .store
            .create_bundle(sender, items, Timestamp::now())
            .await?;
        self.sessions.clear_bundle(sender).await;
        info!(owner = %sender, code = bundle.code, items = bundle.items.len(), "bundle created");

        let link = format::share_link(&self.config.channels.link_base, &bundle.code);
        self.messenger
            .send_keyboard(
                chat,
                &format::upload_confirmation(&link, &bundle.code),
                format::privacy_keyboard(ShareableKind::Bundle, &bundle.code),
            )
            .await?;
        Ok(())
    }

    async fn cancel_sessions(&self, sender: UserId) -> Result<(), EngineError> {
        let chat = ChatId::from(sender);
        let had_bundle = self.sessions.clear_bundle(sender).await;
        let had_wizard = self.sessions.wizard_stage(sender).await.is_some();
        self.sessions.clear_wizard(sender).await;
        self.sessions.clear_unlisted_prompt(sender).await;

        let text = if had_bundle || had_wizard {
            "Cancelled."
        } else {
            "Nothing to cancel."
        };
        self.messenger.send_message(chat, text).await?;
        Ok(())
    }

    async fn list_owned(&self, sender: UserId) -> Result<(), EngineError> {
        let chat = ChatId::from(sender);
        let limit = self.config.access.listing_limit;
        let files = self.store.list_owned_files(sender, limit).await;
        let bundles = self.store.list_owned_bundles(sender, limit).await;

        if files.is_empty() && bundles.is_empty() {
            self.messenger
                .send_message(chat, "You have no files or bundles yet.")
                .await?;
            return Ok(());
        }

        for file in files {
            let link = format::share_link(&self.config.channels.link_base, &file.code);
            self.messenger
                .send_keyboard(
                    chat,
                    &format!("File {} ({})\n{link}", file.code, file.access.mode),
                    format::privacy_keyboard(ShareableKind::File, &file.code),
                )
                .await?;
        }
        for bundle in bundles {
            let link = format::share_link(&self.config.channels.link_base, &bundle.code);
            self.messenger
                .send_keyboard(
                    chat,
                    &format!(
                        "Bundle {} ({} items, {})\n{link}",
                        bundle.code,
                        bundle.items.len(),
                        bundle.access.mode
                    ),
                    format::privacy_keyboard(ShareableKind::Bundle, &bundle.code),
                )
                .await?;
        }
        Ok(())
    }

    /// Reply with a refusal and return false for non-admins
    pub(crate) async fn require_admin(&self, sender: UserId) -> Result<bool, EngineError> {
        if self.store.is_admin(sender).await {
            return Ok(true);
        }
        self.messenger
            .send_message(ChatId::from(sender), "Admins only.")
            .await?;
        Ok(false)
    }
}

fn parse_user_arg(args: &str) -> Option<UserId> {
    args.split_whitespace().next()?.parse::<i64>().ok().map(UserId)
}
