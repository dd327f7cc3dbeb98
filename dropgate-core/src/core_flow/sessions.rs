//! Per-user conversational session registry
//!
//! Each session family keeps a single slot per user; starting a new session
//! of the same family silently replaces the old one. Proof slots carry a
//! deadline and are pruned lazily on read.

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::core_store::model::{Timestamp, UserId};

use super::proof::ProofSession;
use super::wizard::{CodeKind, RedeemWizard, WizardError, WizardStage, WizardStep};

/// Which privacy flow a pending limit prompt belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlistedPrompt {
    /// "file" or "bundle"
    pub kind: String,
    pub code: String,
}

/// In-memory registry of all live conversational state
pub struct SessionRegistry {
    wizards: Mutex<HashMap<UserId, RedeemWizard>>,
    bundles: Mutex<HashMap<UserId, Vec<String>>>,
    proofs: Mutex<HashMap<UserId, ProofSession>>,
    unlisted_prompts: Mutex<HashMap<UserId, UnlistedPrompt>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            wizards: Mutex::new(HashMap::new()),
            bundles: Mutex::new(HashMap::new()),
            proofs: Mutex::new(HashMap::new()),
            unlisted_prompts: Mutex::new(HashMap::new()),
        }
    }

    // --- redeem-creation wizard ---

    /// Open (or replace) a wizard for the user
    pub async fn start_wizard(&self, user: UserId, category: String) {
        self.wizards.lock().await.insert(user, RedeemWizard::new(category));
    }

    pub async fn wizard_stage(&self, user: UserId) -> Option<WizardStage> {
        self.wizards.lock().await.get(&user).map(|w| w.stage)
    }

    /// Apply a code-kind button press. `false` if nothing was awaiting one.
    pub async fn wizard_choose_kind(&self, user: UserId, kind: CodeKind) -> bool {
        match self.wizards.lock().await.get_mut(&user) {
            Some(wizard) => wizard.choose_kind(kind),
            None => false,
        }
    }

    /// Feed a text message into the user's wizard, if one is live.
    ///
    /// The slot is kept through both outcomes; the engine clears it once a
    /// terminal step has actually been executed.
    pub async fn wizard_handle_text(
        &self,
        user: UserId,
        text: &str,
        now: Timestamp,
    ) -> Option<Result<WizardStep, WizardError>> {
        self.wizards
            .lock()
            .await
            .get_mut(&user)
            .map(|wizard| wizard.handle_text(text, now))
    }

    pub async fn clear_wizard(&self, user: UserId) {
        self.wizards.lock().await.remove(&user);
    }

    // --- bundle sessions ---

    /// Open (or reset) a bundle collection session
    pub async fn open_bundle(&self, user: UserId) {
        self.bundles.lock().await.insert(user, Vec::new());
    }

    pub async fn has_bundle(&self, user: UserId) -> bool {
        self.bundles.lock().await.contains_key(&user)
    }

    /// Append an item code to a live session. `None` if no session is open,
    /// otherwise the item count so far.
    pub async fn append_bundle_item(&self, user: UserId, code: String) -> Option<usize> {
        let mut bundles = self.bundles.lock().await;
        let items = bundles.get_mut(&user)?;
        items.push(code);
        Some(items.len())
    }

    /// Snapshot the collected items without closing the session
    pub async fn bundle_items(&self, user: UserId) -> Option<Vec<String>> {
        self.bundles.lock().await.get(&user).cloned()
    }

    /// Discard the session. `true` if one existed.
    pub async fn clear_bundle(&self, user: UserId) -> bool {
        self.bundles.lock().await.remove(&user).is_some()
    }

    // --- proof sessions ---

    /// Arm (or replace) the user's proof slot
    pub async fn set_proof(&self, user: UserId, session: ProofSession) {
        self.proofs.lock().await.insert(user, session);
    }

    /// Look at the live proof slot, pruning it first if expired
    pub async fn peek_proof(&self, user: UserId, now: Timestamp) -> Option<ProofSession> {
        let mut proofs = self.proofs.lock().await;
        if proofs.get(&user).is_some_and(|p| p.is_expired(now)) {
            proofs.remove(&user);
            return None;
        }
        proofs.get(&user).cloned()
    }

    pub async fn clear_proof(&self, user: UserId) {
        self.proofs.lock().await.remove(&user);
    }

    // --- unlisted limit prompts ---

    pub async fn set_unlisted_prompt(&self, user: UserId, prompt: UnlistedPrompt) {
        self.unlisted_prompts.lock().await.insert(user, prompt);
    }

    pub async fn peek_unlisted_prompt(&self, user: UserId) -> Option<UnlistedPrompt> {
        self.unlisted_prompts.lock().await.get(&user).cloned()
    }

    pub async fn clear_unlisted_prompt(&self, user: UserId) {
        self.unlisted_prompts.lock().await.remove(&user);
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: UserId = UserId(1);

    #[tokio::test]
    async fn test_wizard_slot_is_last_writer_wins() {
        let registry = SessionRegistry::new();
        registry.start_wizard(ALICE, "Movies".to_string()).await;
        registry.start_wizard(ALICE, "Premium".to_string()).await;

        let step = registry
            .wizard_handle_text(ALICE, "acct:pw", Timestamp(10))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(step, WizardStep::AccountsAccepted { count: 1 });

        registry.wizard_choose_kind(ALICE, CodeKind::Custom).await;
        let step = registry
            .wizard_handle_text(ALICE, "SUMMER-24", Timestamp(10))
            .await
            .unwrap()
            .unwrap();
        match step {
            WizardStep::MintCustom { category, .. } => assert_eq!(category, "Premium"),
            other => panic!("unexpected step: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_wizard_returns_none() {
        let registry = SessionRegistry::new();
        assert!(registry
            .wizard_handle_text(ALICE, "hello", Timestamp(0))
            .await
            .is_none());
        assert!(!registry.wizard_choose_kind(ALICE, CodeKind::Time).await);
    }

    #[tokio::test]
    async fn test_bundle_lifecycle() {
        let registry = SessionRegistry::new();
        assert!(registry.append_bundle_item(ALICE, "x".into()).await.is_none());

        registry.open_bundle(ALICE).await;
        assert_eq!(registry.append_bundle_item(ALICE, "a1".into()).await, Some(1));
        assert_eq!(registry.append_bundle_item(ALICE, "a2".into()).await, Some(2));
        assert_eq!(
            registry.bundle_items(ALICE).await,
            Some(vec!["a1".to_string(), "a2".to_string()])
        );

        // Reopening resets the collection.
        registry.open_bundle(ALICE).await;
        assert_eq!(registry.bundle_items(ALICE).await, Some(vec![]));

        assert!(registry.clear_bundle(ALICE).await);
        assert!(!registry.clear_bundle(ALICE).await);
    }

    #[tokio::test]
    async fn test_proof_slot_lazy_expiry() {
        let registry = SessionRegistry::new();
        let session = ProofSession::new("CODE123".into(), "Premium".into(), Timestamp(1000), 600);
        registry.set_proof(ALICE, session).await;

        assert!(registry.peek_proof(ALICE, Timestamp(1599)).await.is_some());
        assert!(registry.peek_proof(ALICE, Timestamp(1601)).await.is_none());
        // Pruned for good, even if time rewinds.
        assert!(registry.peek_proof(ALICE, Timestamp(1000)).await.is_none());
    }

    #[tokio::test]
    async fn test_unlisted_prompt_slot() {
        let registry = SessionRegistry::new();
        registry
            .set_unlisted_prompt(
                ALICE,
                UnlistedPrompt { kind: "file".into(), code: "abc".into() },
            )
            .await;
        let prompt = registry.peek_unlisted_prompt(ALICE).await.unwrap();
        assert_eq!(prompt.code, "abc");

        // Peek does not consume; invalid input re-prompts against it.
        assert!(registry.peek_unlisted_prompt(ALICE).await.is_some());
        registry.clear_unlisted_prompt(ALICE).await;
        assert!(registry.peek_unlisted_prompt(ALICE).await.is_none());
    }
}
