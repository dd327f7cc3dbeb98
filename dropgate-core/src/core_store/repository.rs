//! Durable storage seam
//!
//! The engine keeps every collection in memory and writes each one back as a
//! whole after a mutation. The repository therefore only needs load-all and
//! per-collection full overwrite; implementations must replace atomically so
//! a crash never leaves a partial file.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};

use super::model::{Bundle, RedeemCode, StoredFile, UserId};

/// Everything the repository knows, loaded once at startup
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Every identity ever seen
    pub users: BTreeSet<UserId>,

    /// Banned identities
    pub banned_users: BTreeSet<UserId>,

    /// Promoted admins; the configured main admins are never persisted
    pub admins: BTreeSet<UserId>,

    /// Redeem categories, in display order
    pub categories: Vec<String>,

    /// Redeem codes by code
    pub codes: BTreeMap<String, RedeemCode>,

    /// Stored files by code
    pub files: BTreeMap<String, StoredFile>,

    /// Bundles by code
    pub bundles: BTreeMap<String, Bundle>,
}

/// Repository operation errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("I/O failure: {0}")]
    Io(String),

    #[error("Corrupt snapshot: {0}")]
    Corrupt(String),
}

/// Full-overwrite persistence for the entity collections
#[async_trait]
pub trait Repository: Send + Sync {
    /// Load every collection. Missing data yields empty collections.
    async fn load_all(&self) -> Result<Snapshot, RepositoryError>;

    async fn save_users(&self, users: &BTreeSet<UserId>) -> Result<(), RepositoryError>;

    async fn save_banned_users(&self, banned: &BTreeSet<UserId>) -> Result<(), RepositoryError>;

    /// Persist promoted admins only (main admins come from config).
    async fn save_admins(&self, admins: &BTreeSet<UserId>) -> Result<(), RepositoryError>;

    async fn save_categories(&self, categories: &[String]) -> Result<(), RepositoryError>;

    async fn save_codes(&self, codes: &BTreeMap<String, RedeemCode>)
        -> Result<(), RepositoryError>;

    async fn save_files(
        &self,
        files: &BTreeMap<String, StoredFile>,
    ) -> Result<(), RepositoryError>;

    async fn save_bundles(
        &self,
        bundles: &BTreeMap<String, Bundle>,
    ) -> Result<(), RepositoryError>;
}

/// In-memory repository for tests and ephemeral runs
#[derive(Debug, Default)]
pub struct MemoryRepository {
    inner: tokio::sync::Mutex<Snapshot>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a pre-populated snapshot
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            inner: tokio::sync::Mutex::new(snapshot),
        }
    }

    /// Current persisted state, for assertions
    pub async fn snapshot(&self) -> Snapshot {
        self.inner.lock().await.clone()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn load_all(&self) -> Result<Snapshot, RepositoryError> {
        Ok(self.inner.lock().await.clone())
    }

    async fn save_users(&self, users: &BTreeSet<UserId>) -> Result<(), RepositoryError> {
        self.inner.lock().await.users = users.clone();
        Ok(())
    }

    async fn save_banned_users(&self, banned: &BTreeSet<UserId>) -> Result<(), RepositoryError> {
        self.inner.lock().await.banned_users = banned.clone();
        Ok(())
    }

    async fn save_admins(&self, admins: &BTreeSet<UserId>) -> Result<(), RepositoryError> {
        self.inner.lock().await.admins = admins.clone();
        Ok(())
    }

    async fn save_categories(&self, categories: &[String]) -> Result<(), RepositoryError> {
        self.inner.lock().await.categories = categories.to_vec();
        Ok(())
    }

    async fn save_codes(
        &self,
        codes: &BTreeMap<String, RedeemCode>,
    ) -> Result<(), RepositoryError> {
        self.inner.lock().await.codes = codes.clone();
        Ok(())
    }

    async fn save_files(
        &self,
        files: &BTreeMap<String, StoredFile>,
    ) -> Result<(), RepositoryError> {
        self.inner.lock().await.files = files.clone();
        Ok(())
    }

    async fn save_bundles(
        &self,
        bundles: &BTreeMap<String, Bundle>,
    ) -> Result<(), RepositoryError> {
        self.inner.lock().await.bundles = bundles.clone();
        Ok(())
    }
}
