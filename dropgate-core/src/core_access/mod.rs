//! Tri-mode visibility policy for shareable entities
//!
//! Every stored file and bundle embeds an [`AccessPolicy`] deciding who may
//! retrieve it: `Public` (anyone), `Private` (owner only), or `Unlisted`
//! (anyone holding the link, optionally capped to the first N unique
//! viewers). The viewer set is monotonic while the entity stays unlisted:
//! limit changes never evict admitted viewers, and the set is wiped only
//! when the mode actually changes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::core_store::model::UserId;

/// Visibility mode of a shareable entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    /// Anyone with the link or code can access
    Public,
    /// Anyone with the link, optionally limited to the first N unique viewers
    Unlisted,
    /// Only the owner can access
    Private,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccessMode::Public => "public",
            AccessMode::Unlisted => "unlisted",
            AccessMode::Private => "private",
        };
        write!(f, "{}", s)
    }
}

impl AccessMode {
    /// Parse a mode name as it appears in button payloads
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(AccessMode::Public),
            "unlisted" => Some(AccessMode::Unlisted),
            "private" => Some(AccessMode::Private),
            _ => None,
        }
    }
}

/// Why access was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeniedReason {
    /// Entity is private and the requester is not the owner
    OwnerOnly,
    /// The unlisted viewer quota is exhausted
    QuotaExhausted,
}

impl fmt::Display for DeniedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeniedReason::OwnerOnly => write!(f, "owner-only"),
            DeniedReason::QuotaExhausted => write!(f, "quota exhausted"),
        }
    }
}

/// Outcome of an access check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed,
    Denied(DeniedReason),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allowed)
    }
}

/// Visibility record embedded in every file and bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessPolicy {
    /// Current visibility mode
    pub mode: AccessMode,

    /// Viewer cap; only meaningful under `Unlisted`, None = unlimited
    pub limit: Option<u64>,

    /// Users granted access while the entity was unlisted
    pub viewed_by: BTreeSet<UserId>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            mode: AccessMode::Public,
            limit: None,
            viewed_by: BTreeSet::new(),
        }
    }
}

impl AccessPolicy {
    /// Decide whether `requester` may retrieve the entity owned by `owner`.
    ///
    /// The owner always passes; an unlisted viewer who was already admitted
    /// is allowed again regardless of the current limit.
    pub fn evaluate(&self, owner: UserId, requester: UserId) -> AccessDecision {
        if requester == owner {
            return AccessDecision::Allowed;
        }
        match self.mode {
            AccessMode::Public => AccessDecision::Allowed,
            AccessMode::Private => AccessDecision::Denied(DeniedReason::OwnerOnly),
            AccessMode::Unlisted => {
                if self.viewed_by.contains(&requester) {
                    return AccessDecision::Allowed;
                }
                match self.limit {
                    // No cap set: an unlisted link behaves like an
                    // unadvertised public one, no tracking.
                    None => AccessDecision::Allowed,
                    Some(limit) if (self.viewed_by.len() as u64) < limit => {
                        AccessDecision::Allowed
                    }
                    Some(_) => AccessDecision::Denied(DeniedReason::QuotaExhausted),
                }
            }
        }
    }

    /// Charge the viewer quota after a successful delivery.
    ///
    /// Only records under `Unlisted` with a limit set, and never grows the
    /// set past the limit: a delivery that raced past a filled quota is
    /// treated as an unmetered repeat rather than an overshoot. Returns true
    /// if the set changed (callers persist on true).
    pub fn record_view(&mut self, requester: UserId) -> bool {
        if self.mode != AccessMode::Unlisted {
            return false;
        }
        let Some(limit) = self.limit else {
            return false;
        };
        if self.viewed_by.contains(&requester) {
            return false;
        }
        if (self.viewed_by.len() as u64) >= limit {
            return false;
        }
        self.viewed_by.insert(requester)
    }

    /// Switch to `Public` or `Private`, discarding any quota state.
    pub fn set_mode(&mut self, mode: AccessMode) {
        debug_assert!(mode != AccessMode::Unlisted, "use set_unlisted");
        self.mode = mode;
        self.limit = None;
        self.viewed_by.clear();
    }

    /// Switch to `Unlisted` with the given quota (None = unlimited).
    ///
    /// Coming from another mode starts a fresh viewer history; adjusting
    /// the limit of an already-unlisted entity keeps admitted viewers.
    pub fn set_unlisted(&mut self, limit: Option<u64>) {
        if self.mode != AccessMode::Unlisted {
            self.viewed_by.clear();
        }
        self.mode = AccessMode::Unlisted;
        self.limit = limit;
    }
}
