//! Bundle entity: an ordered collection of stored files under one code

use serde::{Deserialize, Serialize};

use super::types::{Timestamp, UserId};
use crate::core_access::AccessPolicy;

/// A shareable, ordered sequence of file codes
///
/// Items must reference existing files at creation time. A file deleted
/// from the storage channel later leaves a dangling item, which retrieval
/// skips with a reported failure rather than repairing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    /// Unique key in the global code namespace
    pub code: String,

    /// Creator; always passes the access check
    pub owner: UserId,

    /// File codes in upload order
    pub items: Vec<String>,

    /// Creation time
    pub created_at: Timestamp,

    /// Visibility record
    pub access: AccessPolicy,
}

impl Bundle {
    pub fn new(code: String, owner: UserId, items: Vec<String>, created_at: Timestamp) -> Self {
        Self {
            code,
            owner,
            items,
            created_at,
            access: AccessPolicy::default(),
        }
    }
}
