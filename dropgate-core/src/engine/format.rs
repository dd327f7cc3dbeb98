//! User-facing text and keyboard builders
//!
//! Everything here is presentation only. Button payloads are the wire
//! contract between outbound keyboards and inbound `ButtonPress` events:
//! `cat_<name>`, `code_type_<kind>`, `proof_<code>`,
//! `privacy:<kind>:<code>:<mode>`.

use crate::core_store::model::{RedeemCode, Timestamp, UserId};
use crate::core_store::{ShareableKind, StoreStats};
use crate::messenger::{Button, Keyboard};

/// Deep link for a share code: `<base>?start=<code>`
pub fn share_link(base: &str, code: &str) -> String {
    format!("{base}?start={code}")
}

pub fn help_text() -> String {
    [
        "Commands:",
        "/start <code> - open a shared file or bundle",
        "/add - create redeem codes",
        "/bundle - start collecting files into a bundle",
        "/finish - close the bundle and get its share link",
        "/cancel - abandon the current bundle or wizard",
        "/myfiles - your uploads and bundles with privacy controls",
        "",
        "Send a file to get a share link, or send a code to open/redeem it.",
    ]
    .join("\n")
}

pub fn welcome_text() -> String {
    format!(
        "Welcome! Send me a file to share it, or a code to open one.\n\n{}",
        help_text()
    )
}

/// Keyboard of category buttons for the /add flow
pub fn category_keyboard(categories: &[String]) -> Keyboard {
    let mut keyboard = Keyboard::new();
    for chunk in categories.chunks(2) {
        let row = chunk
            .iter()
            .map(|c| Button::new(c.clone(), format!("cat_{c}")))
            .collect();
        keyboard = keyboard.row(row);
    }
    keyboard
}

/// Keyboard offering the three redeem-code kinds
pub fn code_kind_keyboard() -> Keyboard {
    Keyboard::new().row(vec![
        Button::new("Custom code", "code_type_custom"),
        Button::new("Time limit", "code_type_time"),
        Button::new("Usage limit", "code_type_limit"),
    ])
}

/// Privacy controls attached to a freshly shared file or bundle
pub fn privacy_keyboard(kind: ShareableKind, code: &str) -> Keyboard {
    let kind = kind.as_str();
    Keyboard::new().row(vec![
        Button::new("Public", format!("privacy:{kind}:{code}:public")),
        Button::new("Unlisted", format!("privacy:{kind}:{code}:unlisted")),
        Button::new("Private", format!("privacy:{kind}:{code}:private")),
    ])
}

/// Button offering proof submission after a successful redemption
pub fn proof_offer_keyboard(code: &str) -> Keyboard {
    Keyboard::new().row(vec![Button::new(
        "Submit proof screenshot",
        format!("proof_{code}"),
    )])
}

/// Caption stamped onto a proof screenshot in the review channel
pub fn proof_caption(
    sender_name: &str,
    sender: UserId,
    code: &str,
    category: &str,
    now: Timestamp,
) -> String {
    format!(
        "Proof from {sender_name} ({sender})\nCode: {code}\nCategory: {category}\nAt: {now}"
    )
}

/// Caption stamped onto a stored upload in the store channel
pub fn store_caption(code: &str, owner_name: &str, owner: UserId) -> String {
    format!("#{code} from {owner_name} ({owner})")
}

pub fn upload_confirmation(link: &str, code: &str) -> String {
    format!("Stored. Share link:\n{link}\n\nOr just share the code: {code}")
}

pub fn redeem_reveal(code: &RedeemCode) -> String {
    format!(
        "Code accepted!\nCategory: {}\nAccount:\n{}",
        code.category, code.account
    )
}

pub fn minted_codes_summary(codes: &[RedeemCode]) -> String {
    let mut out = format!("Created {} code(s):\n", codes.len());
    for c in codes {
        out.push_str(&c.code);
        out.push('\n');
    }
    out
}

pub fn stats_text(stats: &StoreStats) -> String {
    format!(
        "Users: {}\nRedeem codes: {} ({} redemptions)\nFiles: {}\nBundles: {}",
        stats.users, stats.codes, stats.total_redeems, stats.files, stats.bundles
    )
}

/// Shown when every proof delivery strategy failed
pub fn proof_failure_diagnostic(last_error: &str) -> String {
    format!(
        "Could not deliver your proof. Likely causes: the bot lacks admin \
         rights in the proof channel, posting is restricted, or the channel \
         id is wrong.\nLast error: {last_error}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_link_shape() {
        assert_eq!(
            share_link("https://chat.example/mybot", "a1b2c3"),
            "https://chat.example/mybot?start=a1b2c3"
        );
    }

    #[test]
    fn test_privacy_keyboard_payloads() {
        let kb = privacy_keyboard(ShareableKind::Bundle, "xyz");
        let payloads: Vec<&str> = kb.rows[0].iter().map(|b| b.payload.as_str()).collect();
        assert_eq!(
            payloads,
            vec![
                "privacy:bundle:xyz:public",
                "privacy:bundle:xyz:unlisted",
                "privacy:bundle:xyz:private"
            ]
        );
    }

    #[test]
    fn test_category_keyboard_rows_of_two() {
        let cats = vec!["Movies".to_string(), "Tools".to_string(), "Premium".to_string()];
        let kb = category_keyboard(&cats);
        assert_eq!(kb.rows.len(), 2);
        assert_eq!(kb.rows[0].len(), 2);
        assert_eq!(kb.rows[1].len(), 1);
        assert_eq!(kb.rows[1][0].payload, "cat_Premium");
    }

    #[test]
    fn test_proof_caption_carries_identity_code_category() {
        let caption = proof_caption("alice", UserId(7), "CODE1", "Premium", Timestamp(42));
        assert!(caption.contains("alice"));
        assert!(caption.contains('7'));
        assert!(caption.contains("CODE1"));
        assert!(caption.contains("Premium"));
        assert!(caption.contains("42"));
    }
}
