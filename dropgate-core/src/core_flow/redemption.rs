//! Redemption precondition chain
//!
//! Order matters: ban check, then force-join gate, then code validity.
//! A user who has not joined the required channel gets the join link and
//! never learns whether the code exists; the store only increments usage
//! once every gate has passed.

use tracing::info;

use crate::core_store::model::{Timestamp, UserId};
use crate::core_store::{EntityStore, RedeemGrant, StoreError};
use crate::messenger::{ChatId, Messenger};

/// What a redemption attempt resolved to
#[derive(Debug)]
pub enum RedeemOutcome {
    /// Secret revealed; usage already counted and persisted
    Granted(RedeemGrant),

    /// Sender is banned; no further information disclosed
    Banned,

    /// Force-join gate not satisfied (or membership unverifiable)
    JoinRequired { link: String },

    /// No such code
    Invalid,

    /// Code exists but its expiry passed
    Expired,

    /// Code exists but its usage cap is reached
    UsageLimitReached,
}

/// Gate configuration for redemption
pub struct RedemptionGate<'a> {
    /// Channel whose membership is mandatory
    pub channel: ChatId,
    /// Invite link sent when the gate fails
    pub join_link: &'a str,
}

/// Run the full chain for one attempt.
///
/// A transport failure while checking membership is treated as not joined,
/// so flaky transports degrade to an extra join prompt rather than an
/// unmetered redemption.
pub async fn redeem(
    store: &EntityStore,
    messenger: &dyn Messenger,
    gate: RedemptionGate<'_>,
    user: UserId,
    code: &str,
    now: Timestamp,
) -> Result<RedeemOutcome, StoreError> {
    if store.is_banned(user).await {
        return Ok(RedeemOutcome::Banned);
    }

    let joined = messenger
        .check_membership(gate.channel, user)
        .await
        .unwrap_or(false);
    if !joined {
        return Ok(RedeemOutcome::JoinRequired {
            link: gate.join_link.to_string(),
        });
    }

    match store.redeem(code, now).await {
        Ok(grant) => {
            info!(user = %user, code, category = %grant.category, "code redeemed");
            Ok(RedeemOutcome::Granted(grant))
        }
        Err(StoreError::NotFound(_)) => Ok(RedeemOutcome::Invalid),
        Err(StoreError::Redeem(crate::core_store::model::RedeemCodeError::Expired)) => {
            Ok(RedeemOutcome::Expired)
        }
        Err(StoreError::Redeem(crate::core_store::model::RedeemCodeError::MaxUsesReached)) => {
            Ok(RedeemOutcome::UsageLimitReached)
        }
        Err(other) => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_store::model::ContentKind;
    use crate::core_store::MemoryRepository;
    use crate::messenger::{Keyboard, MediaRef, TransportError};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct MembershipOnly {
        joined: bool,
        fail_check: bool,
    }

    #[async_trait]
    impl Messenger for MembershipOnly {
        async fn send_message(&self, _chat: ChatId, _text: &str) -> Result<(), TransportError> {
            Ok(())
        }

        async fn send_keyboard(
            &self,
            _chat: ChatId,
            _text: &str,
            _keyboard: Keyboard,
        ) -> Result<(), TransportError> {
            Ok(())
        }

        async fn copy_message(
            &self,
            _from: ChatId,
            _message_id: i64,
            _to: ChatId,
            _caption: Option<&str>,
        ) -> Result<i64, TransportError> {
            Ok(0)
        }

        async fn send_media(
            &self,
            _chat: ChatId,
            _media: &MediaRef,
            _caption: Option<&str>,
        ) -> Result<i64, TransportError> {
            Ok(0)
        }

        async fn fetch_media_bytes(&self, _media: &MediaRef) -> Result<Vec<u8>, TransportError> {
            Ok(vec![])
        }

        async fn upload_bytes(
            &self,
            _chat: ChatId,
            _bytes: &[u8],
            _kind: ContentKind,
            _caption: Option<&str>,
        ) -> Result<i64, TransportError> {
            Ok(0)
        }

        async fn check_membership(
            &self,
            _chat: ChatId,
            _user: UserId,
        ) -> Result<bool, TransportError> {
            if self.fail_check {
                Err(TransportError("api down".into()))
            } else {
                Ok(self.joined)
            }
        }

    }

    const ALICE: UserId = UserId(1);
    const NOW: Timestamp = Timestamp(5_000);

    fn gate() -> RedemptionGate<'static> {
        RedemptionGate {
            channel: ChatId(-100),
            join_link: "https://chat.example/join",
        }
    }

    async fn store_with_code() -> EntityStore {
        let store = EntityStore::load(
            Arc::new(MemoryRepository::new()),
            vec![],
            vec!["Premium".to_string(), "Movies".to_string()],
            10,
        )
        .await
        .expect("load");
        store
            .create_custom_code(
                "WELCOME1".into(),
                "Premium".into(),
                "acct:pw".into(),
                UserId(99),
            )
            .await
            .expect("seed code");
        store
    }

    #[tokio::test]
    async fn test_banned_checked_before_everything() {
        let store = store_with_code().await;
        store.ban_user(ALICE).await.expect("ban");
        let messenger = MembershipOnly { joined: true, fail_check: false };

        let outcome = redeem(&store, &messenger, gate(), ALICE, "WELCOME1", NOW)
            .await
            .unwrap();
        assert!(matches!(outcome, RedeemOutcome::Banned));
        // Usage untouched.
        assert_eq!(store.get_code("WELCOME1").await.unwrap().used_count, 0);
    }

    #[tokio::test]
    async fn test_join_gate_blocks_before_code_lookup() {
        let store = store_with_code().await;
        let messenger = MembershipOnly { joined: false, fail_check: false };

        // Even a nonexistent code gets the join prompt, not "invalid".
        let outcome = redeem(&store, &messenger, gate(), ALICE, "nope", NOW)
            .await
            .unwrap();
        match outcome {
            RedeemOutcome::JoinRequired { link } => {
                assert_eq!(link, "https://chat.example/join")
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_membership_check_failure_degrades_to_join_prompt() {
        let store = store_with_code().await;
        let messenger = MembershipOnly { joined: true, fail_check: true };

        let outcome = redeem(&store, &messenger, gate(), ALICE, "WELCOME1", NOW)
            .await
            .unwrap();
        assert!(matches!(outcome, RedeemOutcome::JoinRequired { .. }));
        assert_eq!(store.get_code("WELCOME1").await.unwrap().used_count, 0);
    }

    #[tokio::test]
    async fn test_granted_counts_usage() {
        let store = store_with_code().await;
        let messenger = MembershipOnly { joined: true, fail_check: false };

        let outcome = redeem(&store, &messenger, gate(), ALICE, "WELCOME1", NOW)
            .await
            .unwrap();
        match outcome {
            RedeemOutcome::Granted(grant) => {
                assert_eq!(grant.account, "acct:pw");
                assert_eq!(grant.category, "Premium");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(store.get_code("WELCOME1").await.unwrap().used_count, 1);

        // Single-use custom code: second attempt hits the cap.
        let outcome = redeem(&store, &messenger, gate(), ALICE, "WELCOME1", NOW)
            .await
            .unwrap();
        assert!(matches!(outcome, RedeemOutcome::UsageLimitReached));
    }

    #[tokio::test]
    async fn test_unknown_and_expired_codes() {
        let store = store_with_code().await;
        let stale = store
            .create_generated_codes(
                "Movies".into(),
                vec!["m:1".into()],
                1,
                Some(Timestamp(100)),
                UserId(99),
            )
            .await
            .expect("seed timed code")
            .remove(0);
        let messenger = MembershipOnly { joined: true, fail_check: false };

        let outcome = redeem(&store, &messenger, gate(), ALICE, "missing", NOW)
            .await
            .unwrap();
        assert!(matches!(outcome, RedeemOutcome::Invalid));

        let outcome = redeem(&store, &messenger, gate(), ALICE, &stale.code, NOW)
            .await
            .unwrap();
        assert!(matches!(outcome, RedeemOutcome::Expired));
    }
}
