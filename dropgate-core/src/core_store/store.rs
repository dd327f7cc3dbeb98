//! In-memory entity store with write-through persistence
//!
//! All collections are loaded once at startup and held behind
//! `tokio::sync::RwLock`s. Every validate-and-mutate step runs entirely
//! inside the owning collection's write lock, which serializes concurrent
//! redeemers/viewers of the same entity; the corresponding collection is
//! flushed to the repository after the lock is released but before the
//! mutating call returns. Messenger I/O never runs under a lock.
//!
//! Lock order where multiple collections are needed: codes, files, bundles.

use rand::Rng;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::error::StoreError;
use super::model::{Bundle, RedeemCode, StoredFile, Timestamp, UserId};
use super::repository::Repository;
use crate::core_access::AccessMode;

/// Which shareable collection a code belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareableKind {
    File,
    Bundle,
}

impl ShareableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShareableKind::File => "file",
            ShareableKind::Bundle => "bundle",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "file" => Some(ShareableKind::File),
            "bundle" => Some(ShareableKind::Bundle),
            _ => None,
        }
    }
}

/// What a successful redemption releases
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemGrant {
    pub account: String,
    pub category: String,
}

/// Aggregate counters for the stats command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub users: usize,
    pub codes: usize,
    pub total_redeems: u64,
    pub files: usize,
    pub bundles: usize,
}

/// The entity store owning every persisted collection
pub struct EntityStore {
    repo: Arc<dyn Repository>,

    /// Admins fixed by configuration; never persisted, never removable
    main_admins: BTreeSet<UserId>,

    code_length: usize,

    users: RwLock<BTreeSet<UserId>>,
    banned_users: RwLock<BTreeSet<UserId>>,
    admins: RwLock<BTreeSet<UserId>>,
    categories: RwLock<Vec<String>>,
    codes: RwLock<BTreeMap<String, RedeemCode>>,
    files: RwLock<BTreeMap<String, StoredFile>>,
    bundles: RwLock<BTreeMap<String, Bundle>>,
}

impl EntityStore {
    /// Load all collections from the repository.
    ///
    /// `default_categories` seeds the category list when none was persisted.
    pub async fn load(
        repo: Arc<dyn Repository>,
        main_admins: impl IntoIterator<Item = UserId>,
        default_categories: Vec<String>,
        code_length: usize,
    ) -> Result<Self, StoreError> {
        let snapshot = repo.load_all().await?;
        let categories = if snapshot.categories.is_empty() {
            default_categories
        } else {
            snapshot.categories
        };

        Ok(Self {
            repo,
            main_admins: main_admins.into_iter().collect(),
            code_length,
            users: RwLock::new(snapshot.users),
            banned_users: RwLock::new(snapshot.banned_users),
            admins: RwLock::new(snapshot.admins),
            categories: RwLock::new(categories),
            codes: RwLock::new(snapshot.codes),
            files: RwLock::new(snapshot.files),
            bundles: RwLock::new(snapshot.bundles),
        })
    }

    // ===== Users, bans, admins =====

    /// Record an identity; returns true when it was not seen before.
    pub async fn register_user(&self, user: UserId) -> Result<bool, StoreError> {
        let inserted = self.users.write().await.insert(user);
        if inserted {
            self.flush_users().await?;
        }
        Ok(inserted)
    }

    pub async fn is_banned(&self, user: UserId) -> bool {
        self.banned_users.read().await.contains(&user)
    }

    pub async fn ban_user(&self, user: UserId) -> Result<(), StoreError> {
        self.banned_users.write().await.insert(user);
        self.flush_banned().await
    }

    pub async fn unban_user(&self, user: UserId) -> Result<(), StoreError> {
        self.banned_users.write().await.remove(&user);
        self.flush_banned().await
    }

    /// Main admins are admins regardless of the promoted set.
    pub async fn is_admin(&self, user: UserId) -> bool {
        self.main_admins.contains(&user) || self.admins.read().await.contains(&user)
    }

    pub fn is_main_admin(&self, user: UserId) -> bool {
        self.main_admins.contains(&user)
    }

    pub async fn add_admin(&self, user: UserId) -> Result<(), StoreError> {
        if self.main_admins.contains(&user) {
            return Ok(());
        }
        self.admins.write().await.insert(user);
        self.flush_admins().await
    }

    /// (configured main admins, promoted admins)
    pub async fn admin_lists(&self) -> (Vec<UserId>, Vec<UserId>) {
        let extra: Vec<UserId> = self.admins.read().await.iter().copied().collect();
        (self.main_admins.iter().copied().collect(), extra)
    }

    pub async fn known_users(&self) -> Vec<UserId> {
        self.users.read().await.iter().copied().collect()
    }

    // ===== Categories =====

    pub async fn categories(&self) -> Vec<String> {
        self.categories.read().await.clone()
    }

    pub async fn has_category(&self, name: &str) -> bool {
        self.categories.read().await.iter().any(|c| c == name)
    }

    /// Append a category; returns false if it already exists.
    pub async fn add_category(&self, name: String) -> Result<bool, StoreError> {
        {
            let mut categories = self.categories.write().await;
            if categories.iter().any(|c| *c == name) {
                return Ok(false);
            }
            categories.push(name);
        }
        self.flush_categories().await?;
        Ok(true)
    }

    /// Remove a category; returns false if it was not present.
    pub async fn remove_category(&self, name: &str) -> Result<bool, StoreError> {
        let removed = {
            let mut categories = self.categories.write().await;
            let before = categories.len();
            categories.retain(|c| c != name);
            categories.len() != before
        };
        if removed {
            self.flush_categories().await?;
        }
        Ok(removed)
    }

    // ===== Code namespace =====

    /// Whether a code is taken anywhere in the global namespace
    /// (redeem codes, files, and bundles share one space).
    pub async fn code_exists(&self, code: &str) -> bool {
        // One lock at a time, in the codes/files/bundles order.
        if self.codes.read().await.contains_key(code) {
            return true;
        }
        if self.files.read().await.contains_key(code) {
            return true;
        }
        self.bundles.read().await.contains_key(code)
    }

    fn random_code(&self) -> String {
        const CHARSET: &[u8] =
            b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
        let mut rng = rand::rng();
        (0..self.code_length)
            .map(|_| {
                let idx = rng.random_range(0..CHARSET.len());
                CHARSET[idx] as char
            })
            .collect()
    }

    /// Mint a code unused by any collection
    pub async fn generate_unique_code(&self) -> String {
        loop {
            let code = self.random_code();
            if !self.code_exists(&code).await {
                return code;
            }
        }
    }

    // ===== Redeem codes =====

    /// Create a caller-named single-use code. Fails when the code collides
    /// anywhere in the global namespace.
    pub async fn create_custom_code(
        &self,
        code: String,
        category: String,
        account: String,
        created_by: UserId,
    ) -> Result<RedeemCode, StoreError> {
        if self.code_exists(&code).await {
            return Err(StoreError::CodeTaken(code));
        }
        let entry = RedeemCode::custom(code.clone(), category, account, created_by);
        {
            // code_exists ran without the write lock; a concurrent creator
            // may have claimed the name since. Re-check under the guard so
            // the loser errors instead of overwriting the winner.
            let mut codes = self.codes.write().await;
            if codes.contains_key(&code) {
                return Err(StoreError::CodeTaken(code));
            }
            codes.insert(code, entry.clone());
        }
        self.flush_codes().await?;
        Ok(entry)
    }

    /// Create one generated code per account, all sharing `max_uses` and
    /// `expires_at`.
    pub async fn create_generated_codes(
        &self,
        category: String,
        accounts: Vec<String>,
        max_uses: u64,
        expires_at: Option<Timestamp>,
        created_by: UserId,
    ) -> Result<Vec<RedeemCode>, StoreError> {
        let mut made = Vec::with_capacity(accounts.len());
        for account in accounts {
            // Uniqueness was probed without the write lock; retry on the
            // rare race where another creator claimed the code in between.
            let entry = loop {
                let code = self.generate_unique_code().await;
                let mut codes = self.codes.write().await;
                if codes.contains_key(&code) {
                    continue;
                }
                let entry = RedeemCode {
                    code: code.clone(),
                    category: category.clone(),
                    account: account.clone(),
                    max_uses,
                    used_count: 0,
                    expires_at,
                    created_by,
                };
                codes.insert(code, entry.clone());
                break entry;
            };
            made.push(entry);
        }
        self.flush_codes().await?;
        Ok(made)
    }

    pub async fn get_code(&self, code: &str) -> Option<RedeemCode> {
        self.codes.read().await.get(code).cloned()
    }

    /// Atomically check validity and consume one use of a code.
    ///
    /// The increment is persisted before the grant is returned, so the
    /// accounting survives even if the reveal step later fails to render.
    pub async fn redeem(&self, code: &str, now: Timestamp) -> Result<RedeemGrant, StoreError> {
        let grant = {
            let mut codes = self.codes.write().await;
            let entry = codes
                .get_mut(code)
                .ok_or_else(|| StoreError::NotFound(code.to_string()))?;
            entry.mark_redeemed(now)?;
            RedeemGrant {
                account: entry.account.clone(),
                category: entry.category.clone(),
            }
        };
        self.flush_codes().await?;
        debug!(code, "redeem recorded");
        Ok(grant)
    }

    // ===== Files =====

    /// Insert a freshly uploaded file. The code was minted earlier, before
    /// the slow media store round-trip, so re-check uniqueness here.
    pub async fn insert_file(&self, file: StoredFile) -> Result<(), StoreError> {
        if self.codes.read().await.contains_key(&file.code) {
            return Err(StoreError::CodeTaken(file.code));
        }
        if self.bundles.read().await.contains_key(&file.code) {
            return Err(StoreError::CodeTaken(file.code));
        }
        {
            let mut files = self.files.write().await;
            if files.contains_key(&file.code) {
                return Err(StoreError::CodeTaken(file.code));
            }
            files.insert(file.code.clone(), file);
        }
        self.flush_files().await
    }

    pub async fn get_file(&self, code: &str) -> Option<StoredFile> {
        self.files.read().await.get(code).cloned()
    }

    pub async fn get_bundle(&self, code: &str) -> Option<Bundle> {
        self.bundles.read().await.get(code).cloned()
    }

    /// Owned files, newest first, capped to `limit`
    pub async fn list_owned_files(&self, owner: UserId, limit: usize) -> Vec<StoredFile> {
        let files = self.files.read().await;
        let mut owned: Vec<StoredFile> =
            files.values().filter(|f| f.owner == owner).cloned().collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        owned.truncate(limit);
        owned
    }

    /// Owned bundles, newest first, capped to `limit`
    pub async fn list_owned_bundles(&self, owner: UserId, limit: usize) -> Vec<Bundle> {
        let bundles = self.bundles.read().await;
        let mut owned: Vec<Bundle> =
            bundles.values().filter(|b| b.owner == owner).cloned().collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        owned.truncate(limit);
        owned
    }

    // ===== Bundles =====

    /// Materialize a bundle from a session snapshot. Every item must be an
    /// existing file code.
    pub async fn create_bundle(
        &self,
        owner: UserId,
        items: Vec<String>,
        created_at: Timestamp,
    ) -> Result<Bundle, StoreError> {
        {
            let files = self.files.read().await;
            for item in &items {
                if !files.contains_key(item) {
                    return Err(StoreError::MissingItem(item.clone()));
                }
            }
        }
        let code = self.generate_unique_code().await;
        let bundle = Bundle::new(code.clone(), owner, items, created_at);
        self.bundles.write().await.insert(code, bundle.clone());
        self.flush_bundles().await?;
        Ok(bundle)
    }

    // ===== Access control =====

    async fn can_manage(&self, owner: UserId, actor: UserId) -> bool {
        owner == actor || self.is_admin(actor).await
    }

    /// Apply Public or Private visibility, resetting quota state.
    /// Only the owner or an admin may change visibility.
    pub async fn set_access_mode(
        &self,
        kind: ShareableKind,
        code: &str,
        actor: UserId,
        mode: AccessMode,
    ) -> Result<(), StoreError> {
        let actor_is_admin = self.is_admin(actor).await;
        match kind {
            ShareableKind::File => {
                {
                    let mut files = self.files.write().await;
                    let file = files
                        .get_mut(code)
                        .ok_or_else(|| StoreError::NotFound(code.to_string()))?;
                    if file.owner != actor && !actor_is_admin {
                        return Err(StoreError::NotPermitted);
                    }
                    file.access.set_mode(mode);
                }
                self.flush_files().await
            }
            ShareableKind::Bundle => {
                {
                    let mut bundles = self.bundles.write().await;
                    let bundle = bundles
                        .get_mut(code)
                        .ok_or_else(|| StoreError::NotFound(code.to_string()))?;
                    if bundle.owner != actor && !actor_is_admin {
                        return Err(StoreError::NotPermitted);
                    }
                    bundle.access.set_mode(mode);
                }
                self.flush_bundles().await
            }
        }
    }

    /// Apply Unlisted visibility with the given quota (None = unlimited).
    /// Admitted viewers survive a limit-only change.
    pub async fn set_unlisted(
        &self,
        kind: ShareableKind,
        code: &str,
        actor: UserId,
        limit: Option<u64>,
    ) -> Result<(), StoreError> {
        let actor_is_admin = self.is_admin(actor).await;
        match kind {
            ShareableKind::File => {
                {
                    let mut files = self.files.write().await;
                    let file = files
                        .get_mut(code)
                        .ok_or_else(|| StoreError::NotFound(code.to_string()))?;
                    if file.owner != actor && !actor_is_admin {
                        return Err(StoreError::NotPermitted);
                    }
                    file.access.set_unlisted(limit);
                }
                self.flush_files().await
            }
            ShareableKind::Bundle => {
                {
                    let mut bundles = self.bundles.write().await;
                    let bundle = bundles
                        .get_mut(code)
                        .ok_or_else(|| StoreError::NotFound(code.to_string()))?;
                    if bundle.owner != actor && !actor_is_admin {
                        return Err(StoreError::NotPermitted);
                    }
                    bundle.access.set_unlisted(limit);
                }
                self.flush_bundles().await
            }
        }
    }

    /// Charge the unlisted quota after a successful delivery.
    ///
    /// Safe to call for any mode; only unlisted entities with a limit
    /// actually record anything. Persists only when the set changed.
    pub async fn record_view(
        &self,
        kind: ShareableKind,
        code: &str,
        requester: UserId,
    ) -> Result<(), StoreError> {
        match kind {
            ShareableKind::File => {
                let changed = {
                    let mut files = self.files.write().await;
                    match files.get_mut(code) {
                        Some(file) => file.access.record_view(requester),
                        None => {
                            warn!(code, "record_view on vanished file");
                            false
                        }
                    }
                };
                if changed {
                    self.flush_files().await?;
                }
                Ok(())
            }
            ShareableKind::Bundle => {
                let changed = {
                    let mut bundles = self.bundles.write().await;
                    match bundles.get_mut(code) {
                        Some(bundle) => bundle.access.record_view(requester),
                        None => {
                            warn!(code, "record_view on vanished bundle");
                            false
                        }
                    }
                };
                if changed {
                    self.flush_bundles().await?;
                }
                Ok(())
            }
        }
    }

    // ===== Stats =====

    pub async fn stats(&self) -> StoreStats {
        let codes = self.codes.read().await;
        StoreStats {
            users: self.users.read().await.len(),
            codes: codes.len(),
            total_redeems: codes.values().map(|c| c.used_count).sum(),
            files: self.files.read().await.len(),
            bundles: self.bundles.read().await.len(),
        }
    }

    // ===== Flush helpers =====

    async fn flush_users(&self) -> Result<(), StoreError> {
        let snapshot = self.users.read().await.clone();
        Ok(self.repo.save_users(&snapshot).await?)
    }

    async fn flush_banned(&self) -> Result<(), StoreError> {
        let snapshot = self.banned_users.read().await.clone();
        Ok(self.repo.save_banned_users(&snapshot).await?)
    }

    async fn flush_admins(&self) -> Result<(), StoreError> {
        let snapshot = self.admins.read().await.clone();
        Ok(self.repo.save_admins(&snapshot).await?)
    }

    async fn flush_categories(&self) -> Result<(), StoreError> {
        let snapshot = self.categories.read().await.clone();
        Ok(self.repo.save_categories(&snapshot).await?)
    }

    async fn flush_codes(&self) -> Result<(), StoreError> {
        let snapshot = self.codes.read().await.clone();
        Ok(self.repo.save_codes(&snapshot).await?)
    }

    async fn flush_files(&self) -> Result<(), StoreError> {
        let snapshot = self.files.read().await.clone();
        Ok(self.repo.save_files(&snapshot).await?)
    }

    async fn flush_bundles(&self) -> Result<(), StoreError> {
        let snapshot = self.bundles.read().await.clone();
        Ok(self.repo.save_bundles(&snapshot).await?)
    }
}
