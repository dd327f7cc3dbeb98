//! Redeem code entity
//!
//! A redeem code releases one account payload to a bounded number of users.
//! Three kinds exist: custom (caller-picked code text, single use), time
//! (generated code expiring after a fixed number of hours), and limit
//! (generated code capped to the first N redeemers). Codes are only ever
//! mutated by redemption, which increments `used_count`, and are never
//! deleted.

use serde::{Deserialize, Serialize};

use super::types::{Timestamp, UserId};

/// Sentinel for time-kind codes: effectively unlimited uses
pub const UNLIMITED_USES: u64 = u64::MAX;

/// A code releasing an account payload, with usage and expiry bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedeemCode {
    /// Unique key in the global code namespace
    pub code: String,

    /// Category the account belongs to
    pub category: String,

    /// The secret payload revealed on redemption
    pub account: String,

    /// Maximum successful redemptions
    pub max_uses: u64,

    /// Successful redemptions so far (never exceeds `max_uses`)
    pub used_count: u64,

    /// Optional expiry; past this instant the code always rejects
    pub expires_at: Option<Timestamp>,

    /// Who created the code
    pub created_by: UserId,
}

impl RedeemCode {
    /// Custom-kind code: caller supplies the text, single use, no expiry
    pub fn custom(code: String, category: String, account: String, created_by: UserId) -> Self {
        Self {
            code,
            category,
            account,
            max_uses: 1,
            used_count: 0,
            expires_at: None,
            created_by,
        }
    }

    /// Time-kind code: effectively unlimited uses, fixed expiry
    pub fn timed(
        code: String,
        category: String,
        account: String,
        expires_at: Timestamp,
        created_by: UserId,
    ) -> Self {
        Self {
            code,
            category,
            account,
            max_uses: UNLIMITED_USES,
            used_count: 0,
            expires_at: Some(expires_at),
            created_by,
        }
    }

    /// Limit-kind code: capped to the first `max_uses` redeemers, no expiry
    pub fn limited(
        code: String,
        category: String,
        account: String,
        max_uses: u64,
        created_by: UserId,
    ) -> Self {
        Self {
            code,
            category,
            account,
            max_uses,
            used_count: 0,
            expires_at: None,
            created_by,
        }
    }

    /// Check redeemability at `now`. Expiry is checked before the usage cap.
    pub fn is_redeemable(&self, now: Timestamp) -> Result<(), RedeemCodeError> {
        if let Some(expires_at) = self.expires_at {
            if now > expires_at {
                return Err(RedeemCodeError::Expired);
            }
        }

        if self.used_count >= self.max_uses {
            return Err(RedeemCodeError::MaxUsesReached);
        }

        Ok(())
    }

    /// Consume one use. The sole mutation a code ever sees.
    pub fn mark_redeemed(&mut self, now: Timestamp) -> Result<(), RedeemCodeError> {
        self.is_redeemable(now)?;
        self.used_count += 1;
        Ok(())
    }
}

/// Why a code cannot be redeemed
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RedeemCodeError {
    #[error("Code has expired")]
    Expired,

    #[error("Code usage limit reached")]
    MaxUsesReached,
}

#[cfg(test)]
mod tests {
    use super::*;

    const CREATOR: UserId = UserId(7);

    #[test]
    fn test_custom_code_is_single_use() {
        let code = RedeemCode::custom(
            "FEST2025".to_string(),
            "Premium".to_string(),
            "user:pass".to_string(),
            CREATOR,
        );
        assert_eq!(code.max_uses, 1);
        assert_eq!(code.expires_at, None);
        assert_eq!(code.used_count, 0);
    }

    #[test]
    fn test_usage_cap_enforced() {
        let now = Timestamp::from_secs(1_000);
        let mut code = RedeemCode::limited(
            "ABC123".to_string(),
            "Tools".to_string(),
            "acct".to_string(),
            2,
            CREATOR,
        );

        code.mark_redeemed(now).unwrap();
        code.mark_redeemed(now).unwrap();
        assert_eq!(code.used_count, 2);

        let result = code.mark_redeemed(now);
        assert_eq!(result, Err(RedeemCodeError::MaxUsesReached));
        assert_eq!(code.used_count, 2, "failed redemption must not count");
    }

    #[test]
    fn test_expired_code_always_rejected() {
        let expiry = Timestamp::from_secs(1_000);
        let mut code = RedeemCode::timed(
            "t".to_string(),
            "Movies".to_string(),
            "acct".to_string(),
            expiry,
            CREATOR,
        );

        // Unused but past expiry: still rejected.
        assert_eq!(
            code.is_redeemable(Timestamp::from_secs(1_001)),
            Err(RedeemCodeError::Expired)
        );
        assert!(code.mark_redeemed(Timestamp::from_secs(1_001)).is_err());
        assert_eq!(code.used_count, 0);

        // At the expiry instant the code is still live.
        assert!(code.mark_redeemed(Timestamp::from_secs(1_000)).is_ok());
    }

    #[test]
    fn test_timed_code_is_effectively_unlimited() {
        let expiry = Timestamp::from_secs(10_000);
        let mut code = RedeemCode::timed(
            "t".to_string(),
            "Movies".to_string(),
            "acct".to_string(),
            expiry,
            CREATOR,
        );
        for _ in 0..1_000 {
            code.mark_redeemed(Timestamp::from_secs(5_000)).unwrap();
        }
        assert_eq!(code.used_count, 1_000);
    }
}
