//! Redeem-code creation wizard
//!
//! Multi-stage conversational state machine, one slot per user:
//! `AwaitingAccounts -> AwaitingCodeKind -> {AwaitingCustomCode |
//! AwaitingTimeValue | AwaitingLimitValue} -> terminal`. Invalid input
//! re-prompts in the same stage without discarding collected accounts; the
//! engine executes the terminal [`WizardStep`] against the store and clears
//! the slot.

use crate::core_store::model::Timestamp;

/// Where the wizard currently sits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStage {
    /// Waiting for one account payload per line
    AwaitingAccounts,
    /// Waiting for a code-kind button press
    AwaitingCodeKind,
    /// Waiting for the custom code text
    AwaitingCustomCode,
    /// Waiting for the expiry in hours
    AwaitingTimeValue,
    /// Waiting for the per-code user limit
    AwaitingLimitValue,
}

/// The three code kinds a creator can pick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    Custom,
    Time,
    Limit,
}

impl CodeKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "custom" => Some(CodeKind::Custom),
            "time" => Some(CodeKind::Time),
            "limit" => Some(CodeKind::Limit),
            _ => None,
        }
    }
}

/// Terminal outcome of a wizard text input, executed by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardStep {
    /// Accounts collected; ask for the code kind next
    AccountsAccepted { count: usize },

    /// Mint one single-use code with caller-picked text.
    /// `dropped` counts extra accounts discarded beyond the first.
    MintCustom {
        code: String,
        category: String,
        account: String,
        dropped: usize,
    },

    /// Mint one time-limited code per collected account
    MintTimed {
        category: String,
        accounts: Vec<String>,
        expires_at: Timestamp,
    },

    /// Mint one usage-capped code per collected account
    MintLimited {
        category: String,
        accounts: Vec<String>,
        max_uses: u64,
    },
}

/// Recoverable input problems; the wizard stays in its stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WizardError {
    #[error("Send at least one non-empty line")]
    EmptyAccounts,

    #[error("Invalid code format: use letters/digits/-/_ (4-24 chars)")]
    InvalidCustomCode,

    #[error("Send a positive whole number")]
    InvalidNumber,

    #[error("Pick a code type with the buttons first")]
    AwaitingButton,
}

/// Per-user wizard state
#[derive(Debug, Clone)]
pub struct RedeemWizard {
    pub stage: WizardStage,
    pub category: String,
    pub accounts: Vec<String>,
}

impl RedeemWizard {
    /// Enter the wizard for a chosen category
    pub fn new(category: String) -> Self {
        Self {
            stage: WizardStage::AwaitingAccounts,
            category,
            accounts: Vec::new(),
        }
    }

    /// Apply a code-kind button press. Only valid while awaiting the kind.
    pub fn choose_kind(&mut self, kind: CodeKind) -> bool {
        if self.stage != WizardStage::AwaitingCodeKind {
            return false;
        }
        self.stage = match kind {
            CodeKind::Custom => WizardStage::AwaitingCustomCode,
            CodeKind::Time => WizardStage::AwaitingTimeValue,
            CodeKind::Limit => WizardStage::AwaitingLimitValue,
        };
        true
    }

    /// Feed a text message into the current stage.
    ///
    /// Errors leave stage and collected accounts untouched so the caller
    /// can re-prompt.
    pub fn handle_text(&mut self, text: &str, now: Timestamp) -> Result<WizardStep, WizardError> {
        match self.stage {
            WizardStage::AwaitingAccounts => {
                let lines: Vec<String> = text
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .collect();
                if lines.is_empty() {
                    return Err(WizardError::EmptyAccounts);
                }
                let count = lines.len();
                self.accounts = lines;
                self.stage = WizardStage::AwaitingCodeKind;
                Ok(WizardStep::AccountsAccepted { count })
            }
            WizardStage::AwaitingCodeKind => Err(WizardError::AwaitingButton),
            WizardStage::AwaitingCustomCode => {
                let code = text.trim();
                if !is_valid_custom_code(code) {
                    return Err(WizardError::InvalidCustomCode);
                }
                // Only the first account binds to a custom code.
                Ok(WizardStep::MintCustom {
                    code: code.to_string(),
                    category: self.category.clone(),
                    account: self.accounts[0].clone(),
                    dropped: self.accounts.len().saturating_sub(1),
                })
            }
            WizardStage::AwaitingTimeValue => {
                let hours = parse_positive(text).ok_or(WizardError::InvalidNumber)?;
                Ok(WizardStep::MintTimed {
                    category: self.category.clone(),
                    accounts: self.accounts.clone(),
                    expires_at: now.plus_secs(hours.saturating_mul(3600)),
                })
            }
            WizardStage::AwaitingLimitValue => {
                let max_uses = parse_positive(text).ok_or(WizardError::InvalidNumber)?;
                Ok(WizardStep::MintLimited {
                    category: self.category.clone(),
                    accounts: self.accounts.clone(),
                    max_uses,
                })
            }
        }
    }
}

/// `[A-Za-z0-9_-]{4,24}`
fn is_valid_custom_code(code: &str) -> bool {
    (4..=24).contains(&code.len())
        && code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn parse_positive(text: &str) -> Option<u64> {
    match text.trim().parse::<u64>() {
        Ok(n) if n > 0 => Some(n),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: Timestamp = Timestamp(1_000_000);

    fn wizard_with_accounts(accounts: &[&str]) -> RedeemWizard {
        let mut wizard = RedeemWizard::new("Premium".to_string());
        wizard
            .handle_text(&accounts.join("\n"), NOW)
            .expect("accounts accepted");
        wizard
    }

    #[test]
    fn test_empty_accounts_reprompt() {
        let mut wizard = RedeemWizard::new("Premium".to_string());
        assert_eq!(
            wizard.handle_text("  \n\n  ", NOW),
            Err(WizardError::EmptyAccounts)
        );
        assert_eq!(wizard.stage, WizardStage::AwaitingAccounts);
    }

    #[test]
    fn test_accounts_one_per_line() {
        let mut wizard = RedeemWizard::new("Premium".to_string());
        let step = wizard.handle_text("a:1\n\n  b:2  \nc:3", NOW).unwrap();
        assert_eq!(step, WizardStep::AccountsAccepted { count: 3 });
        assert_eq!(wizard.accounts, vec!["a:1", "b:2", "c:3"]);
        assert_eq!(wizard.stage, WizardStage::AwaitingCodeKind);
    }

    #[test]
    fn test_text_while_awaiting_kind_is_rejected() {
        let mut wizard = wizard_with_accounts(&["a"]);
        assert_eq!(
            wizard.handle_text("custom", NOW),
            Err(WizardError::AwaitingButton)
        );
    }

    #[test]
    fn test_kind_selection_transitions() {
        let mut wizard = wizard_with_accounts(&["a"]);
        assert!(wizard.choose_kind(CodeKind::Time));
        assert_eq!(wizard.stage, WizardStage::AwaitingTimeValue);

        // Pressing again after leaving the kind stage does nothing.
        assert!(!wizard.choose_kind(CodeKind::Custom));
    }

    #[test]
    fn test_custom_code_validation_keeps_accounts() {
        let mut wizard = wizard_with_accounts(&["a", "b"]);
        wizard.choose_kind(CodeKind::Custom);

        assert_eq!(
            wizard.handle_text("ab", NOW),
            Err(WizardError::InvalidCustomCode)
        );
        assert_eq!(
            wizard.handle_text("has space", NOW),
            Err(WizardError::InvalidCustomCode)
        );
        assert_eq!(wizard.accounts.len(), 2, "accounts retained on re-prompt");

        let step = wizard.handle_text(" FEST2025 ", NOW).unwrap();
        assert_eq!(
            step,
            WizardStep::MintCustom {
                code: "FEST2025".to_string(),
                category: "Premium".to_string(),
                account: "a".to_string(),
                dropped: 1,
            }
        );
    }

    #[test]
    fn test_custom_code_charset_bounds() {
        assert!(is_valid_custom_code("ab-_"));
        assert!(is_valid_custom_code(&"x".repeat(24)));
        assert!(!is_valid_custom_code(&"x".repeat(25)));
        assert!(!is_valid_custom_code("abc"));
        assert!(!is_valid_custom_code("abc!"));
    }

    #[test]
    fn test_time_kind_shares_one_expiry() {
        let mut wizard = wizard_with_accounts(&["a", "b", "c"]);
        wizard.choose_kind(CodeKind::Time);

        assert_eq!(wizard.handle_text("zero", NOW), Err(WizardError::InvalidNumber));
        assert_eq!(wizard.handle_text("0", NOW), Err(WizardError::InvalidNumber));

        let step = wizard.handle_text("2", NOW).unwrap();
        assert_eq!(
            step,
            WizardStep::MintTimed {
                category: "Premium".to_string(),
                accounts: vec!["a".to_string(), "b".to_string(), "c".to_string()],
                expires_at: NOW.plus_secs(7200),
            }
        );
    }

    #[test]
    fn test_huge_hour_value_saturates() {
        let mut wizard = wizard_with_accounts(&["a"]);
        wizard.choose_kind(CodeKind::Time);

        let step = wizard.handle_text(&u64::MAX.to_string(), NOW).unwrap();
        assert_eq!(
            step,
            WizardStep::MintTimed {
                category: "Premium".to_string(),
                accounts: vec!["a".to_string()],
                expires_at: Timestamp(u64::MAX),
            }
        );
    }

    #[test]
    fn test_limit_kind_carries_max_uses() {
        let mut wizard = wizard_with_accounts(&["a"]);
        wizard.choose_kind(CodeKind::Limit);

        let step = wizard.handle_text("100", NOW).unwrap();
        assert_eq!(
            step,
            WizardStep::MintLimited {
                category: "Premium".to_string(),
                accounts: vec!["a".to_string()],
                max_uses: 100,
            }
        );
    }

    #[test]
    fn test_code_kind_parse() {
        assert_eq!(CodeKind::parse("custom"), Some(CodeKind::Custom));
        assert_eq!(CodeKind::parse("time"), Some(CodeKind::Time));
        assert_eq!(CodeKind::parse("limit"), Some(CodeKind::Limit));
        assert_eq!(CodeKind::parse("other"), None);
    }
}
