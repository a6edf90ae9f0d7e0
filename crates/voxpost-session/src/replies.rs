// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User-facing texts and inline keyboards.

use chrono::{DateTime, Utc};
use voxpost_core::{Action, Button, ContentKind, Keyboard, Tariff};

use crate::error::EngineError;
use crate::state::FormattingPrefs;

pub fn main_menu() -> Keyboard {
    Keyboard::new(vec![
        vec![Button::action("Create post", Action::CreatePost)],
        vec![
            Button::action("Status", Action::Status),
            Button::action("Subscribe", Action::Subscribe),
        ],
    ])
}

pub fn kind_picker(prefs: FormattingPrefs) -> Keyboard {
    let mut rows: Vec<Vec<Button>> = ContentKind::ALL
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|&k| Button::action(k.label(), Action::PickKind(k)))
                .collect()
        })
        .collect();
    rows.push(vec![
        Button::action(toggle_label("Emoji", prefs.emoji), Action::ToggleEmoji),
        Button::action(toggle_label("Hashtags", prefs.hashtags), Action::ToggleHashtags),
    ]);
    rows.push(vec![Button::action("Main menu", Action::MainMenu)]);
    Keyboard::new(rows)
}

fn toggle_label(name: &str, on: bool) -> String {
    format!("{name}: {}", if on { "on" } else { "off" })
}

pub fn dictation() -> Keyboard {
    Keyboard::new(vec![vec![
        Button::action("Create", Action::StartCreation),
        Button::action("Main menu", Action::MainMenu),
    ]])
}

pub fn editing() -> Keyboard {
    Keyboard::new(vec![vec![
        Button::action("Apply edits", Action::ApplyEdits),
        Button::action("Main menu", Action::MainMenu),
    ]])
}

pub fn review() -> Keyboard {
    Keyboard::new(vec![
        vec![
            Button::action("Approve", Action::Approve),
            Button::action("Edit", Action::Edit),
        ],
        vec![
            Button::action("Save", Action::Save),
            Button::action("Main menu", Action::MainMenu),
        ],
    ])
}

pub fn upsell() -> Keyboard {
    Keyboard::new(vec![vec![
        Button::action("Subscribe", Action::Subscribe),
        Button::action("Main menu", Action::MainMenu),
    ]])
}

pub fn welcome(referral_code: Option<&str>) -> String {
    let mut text = String::from(
        "Hi! Dictate your thoughts as voice messages and I will turn them into a ready post.\n\
         Tap Create post to begin.",
    );
    if let Some(code) = referral_code {
        text.push_str(&format!("\n\nYour referral code: {code}"));
    }
    text
}

pub const PICK_KIND: &str = "What are we writing?";
pub const MAIN_MENU: &str = "Main menu.";
pub const USE_VOICE: &str = "Send me a voice message. Tap Create post to start a new post.";
pub const GENERATING: &str = "Transcribing and writing your post...";
pub const EDIT_PROMPT: &str = "Dictate your changes as voice messages, then tap Apply edits.";
pub const SAVED: &str = "Saved to your history.";
pub const CANCELLED_SUBSCRIPTION: &str =
    "Subscription cancelled. Paid access stays until the end of the paid period.";
pub const NO_SUBSCRIPTION: &str = "You have no active subscription.";

pub fn kind_selected(kind: ContentKind) -> String {
    format!(
        "{}. Send one or more voice messages, then tap Create.",
        kind.label()
    )
}

pub fn fragment_accepted(count: usize) -> String {
    format!("Got it ({count} so far). Dictate more or tap Create.")
}

pub fn approved(remaining: Option<u32>) -> String {
    match remaining {
        Some(n) => format!("Approved! Posts left today: {n}."),
        None => "Approved!".to_string(),
    }
}

pub fn formatting(prefs: FormattingPrefs) -> String {
    format!(
        "Formatting updated. {}, {}.",
        toggle_label("Emoji", prefs.emoji),
        toggle_label("Hashtags", prefs.hashtags)
    )
}

pub fn status(tariff: Tariff, remaining: Option<u32>, next_payment: Option<DateTime<Utc>>) -> String {
    let mut text = match remaining {
        Some(n) => format!("Tariff: {tariff}. Posts left today: {n}."),
        None => format!("Tariff: {tariff}. Unlimited posts."),
    };
    if let Some(next) = next_payment {
        text.push_str(&format!("\nNext payment: {}.", next.format("%Y-%m-%d")));
    }
    text
}

pub fn payment_link() -> &'static str {
    "Tap the button below to pay. Your tariff switches to paid once the payment goes through."
}

/// Reply for a failed handler. `None` means stay silent.
pub fn for_error(err: &EngineError) -> Option<String> {
    let text = match err {
        EngineError::InvalidTransition { .. } => {
            "That action is not available right now. Open the main menu with /start."
        }
        EngineError::EmptyBuffer => "Send at least one voice message first.",
        EngineError::FragmentNotReady => {
            "Your voice messages are still downloading. Try again in a moment."
        }
        EngineError::AlreadyGenerating => "Your post is already being written, please wait.",
        EngineError::QuotaExceeded { limit } => {
            return Some(format!(
                "You have used all {limit} free posts for today. Subscribe for unlimited posts \
                 or come back tomorrow."
            ));
        }
        EngineError::GenerationFailed(_) => {
            "I could not make a post from these recordings. Tap Create to try again or record more."
        }
        EngineError::ServiceUnavailable(_) => {
            "The service is temporarily unavailable. Tap Create to try again."
        }
        EngineError::Billing(voxpost_billing::BillingError::AlreadySubscribed) => {
            "You already have an active subscription."
        }
        EngineError::Billing(voxpost_billing::BillingError::NotSubscribed) => NO_SUBSCRIPTION,
        EngineError::UpstreamPermanent(_) | EngineError::Billing(_) | EngineError::Internal(_) => {
            "Something went wrong. Please try again."
        }
        EngineError::Cancelled => return None,
    };
    Some(text.to_string())
}

/// Keyboard attached to an error reply.
pub fn error_keyboard(err: &EngineError) -> Option<Keyboard> {
    match err {
        EngineError::QuotaExceeded { .. } => Some(upsell()),
        EngineError::InvalidTransition { .. } => Some(main_menu()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_picker_offers_every_kind() {
        let picker = kind_picker(FormattingPrefs::default());
        let actions: Vec<Action> = picker.actions().collect();
        for kind in ContentKind::ALL {
            assert!(actions.contains(&Action::PickKind(kind)));
        }
        assert!(actions.contains(&Action::ToggleEmoji));
    }

    #[test]
    fn cancelled_is_silent() {
        assert!(for_error(&EngineError::Cancelled).is_none());
        let quota = for_error(&EngineError::QuotaExceeded { limit: 5 }).unwrap();
        assert!(quota.contains("5 free posts"));
        assert_eq!(error_keyboard(&EngineError::QuotaExceeded { limit: 5 }), Some(upsell()));
    }

    #[test]
    fn status_mentions_next_payment() {
        let next = DateTime::parse_from_rfc3339("2026-05-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let text = status(Tariff::Paid, None, Some(next));
        assert!(text.contains("Unlimited"));
        assert!(text.contains("2026-05-01"));
        assert!(status(Tariff::Free, Some(3), None).contains("Posts left today: 3"));
    }
}
