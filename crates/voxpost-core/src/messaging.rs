// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Platform-neutral inbound events and outbound messages.

use std::fmt;
use std::str::FromStr;

use crate::format::TextEntity;
use crate::types::{ContentKind, MessageId, UserId};

/// A user intent carried by a button press or command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    CreatePost,
    PickKind(ContentKind),
    StartCreation,
    Approve,
    Edit,
    ApplyEdits,
    Save,
    MainMenu,
    Status,
    Subscribe,
    CancelSubscription,
    ToggleEmoji,
    ToggleHashtags,
}

impl fmt::Display for Action {
    /// Renders the compact callback-data form, e.g. `kind:telegram_post`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::CreatePost => f.write_str("create_post"),
            Action::PickKind(kind) => write!(f, "kind:{kind}"),
            Action::StartCreation => f.write_str("start_creation"),
            Action::Approve => f.write_str("approve"),
            Action::Edit => f.write_str("edit"),
            Action::ApplyEdits => f.write_str("apply_edits"),
            Action::Save => f.write_str("save"),
            Action::MainMenu => f.write_str("main_menu"),
            Action::Status => f.write_str("status"),
            Action::Subscribe => f.write_str("subscribe"),
            Action::CancelSubscription => f.write_str("cancel_subscription"),
            Action::ToggleEmoji => f.write_str("toggle_emoji"),
            Action::ToggleHashtags => f.write_str("toggle_hashtags"),
        }
    }
}

/// Callback data that does not name a known action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action `{0}`")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(kind) = s.strip_prefix("kind:") {
            return ContentKind::from_str(kind)
                .map(Action::PickKind)
                .map_err(|_| UnknownAction(s.to_string()));
        }
        let action = match s {
            "create_post" => Action::CreatePost,
            "start_creation" => Action::StartCreation,
            "approve" => Action::Approve,
            "edit" => Action::Edit,
            "apply_edits" => Action::ApplyEdits,
            "save" => Action::Save,
            "main_menu" => Action::MainMenu,
            "status" => Action::Status,
            "subscribe" => Action::Subscribe,
            "cancel_subscription" => Action::CancelSubscription,
            "toggle_emoji" => Action::ToggleEmoji,
            "toggle_hashtags" => Action::ToggleHashtags,
            other => return Err(UnknownAction(other.to_string())),
        };
        Ok(action)
    }
}

/// What pressing a button does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonTarget {
    Action(Action),
    Url(String),
}

/// One inline button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub target: ButtonTarget,
}

impl Button {
    pub fn action(label: impl Into<String>, action: Action) -> Self {
        Self {
            label: label.into(),
            target: ButtonTarget::Action(action),
        }
    }

    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target: ButtonTarget::Url(url.into()),
        }
    }
}

/// Rows of inline buttons attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new(rows: Vec<Vec<Button>>) -> Self {
        Self { rows }
    }

    /// Every action reachable from this keyboard, row-major.
    pub fn actions(&self) -> impl Iterator<Item = Action> + '_ {
        self.rows.iter().flatten().filter_map(|b| match b.target {
            ButtonTarget::Action(a) => Some(a),
            ButtonTarget::Url(_) => None,
        })
    }
}

/// A message to deliver to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub user_id: UserId,
    pub text: String,
    pub entities: Vec<TextEntity>,
    pub keyboard: Option<Keyboard>,
}

impl OutboundMessage {
    pub fn text(user_id: UserId, text: impl Into<String>) -> Self {
        Self {
            user_id,
            text: text.into(),
            entities: Vec::new(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    pub fn with_entities(mut self, entities: Vec<TextEntity>) -> Self {
        self.entities = entities;
        self
    }
}

/// What the user did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundKind {
    /// `/start`, optionally carrying a referral code.
    Start { referral: Option<String> },
    Voice {
        file_handle: String,
        message_id: MessageId,
    },
    Text(String),
    Action(Action),
}

/// A decoded event from the messaging platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub user_id: UserId,
    pub handle: Option<String>,
    pub kind: InboundKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_round_trip_through_callback_data() {
        let all = [
            Action::CreatePost,
            Action::PickKind(ContentKind::InstagramPost),
            Action::StartCreation,
            Action::Approve,
            Action::Edit,
            Action::ApplyEdits,
            Action::Save,
            Action::MainMenu,
            Action::Status,
            Action::Subscribe,
            Action::CancelSubscription,
            Action::ToggleEmoji,
            Action::ToggleHashtags,
        ];
        for action in all {
            let data = action.to_string();
            assert!(data.len() <= 64, "callback data must fit the platform limit");
            assert_eq!(data.parse::<Action>().unwrap(), action);
        }
    }

    #[test]
    fn unknown_callback_data_is_rejected() {
        assert!("launch_rockets".parse::<Action>().is_err());
        assert!("kind:podcast".parse::<Action>().is_err());
    }

    #[test]
    fn keyboard_lists_actions_but_not_urls() {
        let kb = Keyboard::new(vec![
            vec![Button::action("Approve", Action::Approve)],
            vec![Button::url("Pay", "https://pay.example")],
        ]);
        assert_eq!(kb.actions().collect::<Vec<_>>(), vec![Action::Approve]);
    }
}
