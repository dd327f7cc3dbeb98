//! Entity store: persisted collections and their write-through persistence

pub mod error;
pub mod json_repository;
pub mod model;
pub mod repository;
pub mod store;

pub use error::StoreError;
pub use json_repository::JsonFileRepository;
pub use repository::{MemoryRepository, Repository, RepositoryError, Snapshot};
pub use store::{EntityStore, RedeemGrant, ShareableKind, StoreStats};
