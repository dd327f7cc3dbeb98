//! Persisted entity model

pub mod bundle;
pub mod file;
pub mod redeem_code;
pub mod types;

pub use bundle::Bundle;
pub use file::{ContentKind, StoredFile};
pub use redeem_code::{RedeemCode, RedeemCodeError, UNLIMITED_USES};
pub use types::{Timestamp, UserId};
