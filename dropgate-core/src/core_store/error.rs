//! Entity store error types

use thiserror::Error;

use super::model::RedeemCodeError;
use super::repository::RepositoryError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unknown code: {0}")]
    NotFound(String),

    #[error("Code already exists: {0}")]
    CodeTaken(String),

    #[error(transparent)]
    Redeem(#[from] RedeemCodeError),

    #[error("Bundle item does not exist: {0}")]
    MissingItem(String),

    #[error("Not permitted to modify this entity")]
    NotPermitted,

    #[error("Persistence failed: {0}")]
    Persistence(#[from] RepositoryError),
}
