//! Conversational flows layered on top of the entity store

pub mod proof;
pub mod redemption;
pub mod sessions;
pub mod wizard;

pub use proof::{ProofError, ProofPipeline, ProofSession};
pub use redemption::{redeem, RedeemOutcome, RedemptionGate};
pub use sessions::{SessionRegistry, UnlistedPrompt};
pub use wizard::{CodeKind, RedeemWizard, WizardError, WizardStage, WizardStep};
