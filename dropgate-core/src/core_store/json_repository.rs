//! File-backed repository
//!
//! Identity sets persist as one id per line, everything else as JSON maps.
//! Every write goes to a sibling `.tmp` file first and is renamed over the
//! target, so a crash mid-write leaves the previous snapshot intact.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::info;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::model::{Bundle, RedeemCode, StoredFile, UserId};
use super::repository::{Repository, RepositoryError, Snapshot};

const USERS_FILE: &str = "users.txt";
const BANNED_USERS_FILE: &str = "banned_users.txt";
const ADMINS_FILE: &str = "admins.txt";
const CATEGORIES_FILE: &str = "categories.txt";
const CODES_FILE: &str = "codes.json";
const FILES_DB_FILE: &str = "files_db.json";
const BUNDLES_DB_FILE: &str = "bundles_db.json";

/// Repository persisting each collection as a file in one directory
pub struct JsonFileRepository {
    data_dir: PathBuf,
}

impl JsonFileRepository {
    /// Open (and create if needed) the data directory
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)
            .map_err(|e| RepositoryError::Io(format!("create {}: {}", data_dir.display(), e)))?;
        Ok(Self { data_dir })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    /// Write-then-rename so the target is replaced atomically
    async fn write_atomic(&self, name: &str, contents: &[u8]) -> Result<(), RepositoryError> {
        let target = self.path(name);
        let tmp = self.path(&format!("{}.tmp", name));
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| RepositoryError::Io(format!("write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &target)
            .await
            .map_err(|e| RepositoryError::Io(format!("rename {}: {}", target.display(), e)))?;
        Ok(())
    }

    async fn save_id_set(
        &self,
        name: &str,
        ids: &BTreeSet<UserId>,
    ) -> Result<(), RepositoryError> {
        let mut out = String::new();
        for id in ids {
            out.push_str(&id.to_string());
            out.push('\n');
        }
        self.write_atomic(name, out.as_bytes()).await
    }

    async fn save_json<T: Serialize>(&self, name: &str, value: &T) -> Result<(), RepositoryError> {
        let bytes = serde_json::to_vec_pretty(value)
            .map_err(|e| RepositoryError::Corrupt(format!("encode {}: {}", name, e)))?;
        self.write_atomic(name, &bytes).await
    }

    async fn load_id_set(path: &Path) -> Result<BTreeSet<UserId>, RepositoryError> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => {
                let mut ids = BTreeSet::new();
                for line in contents.lines() {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let id: i64 = line.parse().map_err(|e| {
                        RepositoryError::Corrupt(format!("{}: bad id {:?}: {}", path.display(), line, e))
                    })?;
                    ids.insert(UserId(id));
                }
                Ok(ids)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "id file not found, starting empty");
                Ok(BTreeSet::new())
            }
            Err(e) => Err(RepositoryError::Io(format!("read {}: {}", path.display(), e))),
        }
    }

    async fn load_json<T: DeserializeOwned + Default>(
        path: &Path,
    ) -> Result<T, RepositoryError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| RepositoryError::Corrupt(format!("{}: {}", path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "snapshot not found, starting empty");
                Ok(T::default())
            }
            Err(e) => Err(RepositoryError::Io(format!("read {}: {}", path.display(), e))),
        }
    }

    async fn load_lines(path: &Path) -> Result<Vec<String>, RepositoryError> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => Ok(contents
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(RepositoryError::Io(format!("read {}: {}", path.display(), e))),
        }
    }
}

#[async_trait]
impl Repository for JsonFileRepository {
    async fn load_all(&self) -> Result<Snapshot, RepositoryError> {
        Ok(Snapshot {
            users: Self::load_id_set(&self.path(USERS_FILE)).await?,
            banned_users: Self::load_id_set(&self.path(BANNED_USERS_FILE)).await?,
            admins: Self::load_id_set(&self.path(ADMINS_FILE)).await?,
            categories: Self::load_lines(&self.path(CATEGORIES_FILE)).await?,
            codes: Self::load_json(&self.path(CODES_FILE)).await?,
            files: Self::load_json(&self.path(FILES_DB_FILE)).await?,
            bundles: Self::load_json(&self.path(BUNDLES_DB_FILE)).await?,
        })
    }

    async fn save_users(&self, users: &BTreeSet<UserId>) -> Result<(), RepositoryError> {
        self.save_id_set(USERS_FILE, users).await
    }

    async fn save_banned_users(&self, banned: &BTreeSet<UserId>) -> Result<(), RepositoryError> {
        self.save_id_set(BANNED_USERS_FILE, banned).await
    }

    async fn save_admins(&self, admins: &BTreeSet<UserId>) -> Result<(), RepositoryError> {
        self.save_id_set(ADMINS_FILE, admins).await
    }

    async fn save_categories(&self, categories: &[String]) -> Result<(), RepositoryError> {
        let mut out = String::new();
        for cat in categories {
            out.push_str(cat);
            out.push('\n');
        }
        self.write_atomic(CATEGORIES_FILE, out.as_bytes()).await
    }

    async fn save_codes(
        &self,
        codes: &BTreeMap<String, RedeemCode>,
    ) -> Result<(), RepositoryError> {
        self.save_json(CODES_FILE, codes).await
    }

    async fn save_files(
        &self,
        files: &BTreeMap<String, StoredFile>,
    ) -> Result<(), RepositoryError> {
        self.save_json(FILES_DB_FILE, files).await
    }

    async fn save_bundles(
        &self,
        bundles: &BTreeMap<String, Bundle>,
    ) -> Result<(), RepositoryError> {
        self.save_json(BUNDLES_DB_FILE, bundles).await
    }
}
