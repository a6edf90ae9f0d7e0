// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Update decoding.
//!
//! Turns Telegram messages and callback queries into platform-neutral
//! [`InboundEvent`]s. Only private chats are served; the chat id of a DM
//! equals the sender's user id, which is what outbound sends target.

use teloxide::types::{CallbackQuery, ChatKind, Message, User};
use tracing::debug;
use voxpost_core::{Action, InboundEvent, InboundKind, MessageId, UserId};

/// Checks whether the message is from a private (DM) chat.
pub fn is_dm(msg: &Message) -> bool {
    matches!(msg.chat.kind, ChatKind::Private(_))
}

fn user_id(user: &User) -> Option<UserId> {
    i64::try_from(user.id.0).ok().map(UserId)
}

/// Decodes a message into an event. Returns `None` for group traffic,
/// anonymous senders and content types the bot does not handle.
pub fn decode_message(msg: &Message) -> Option<InboundEvent> {
    if !is_dm(msg) {
        debug!(chat_id = msg.chat.id.0, "ignoring non-DM message");
        return None;
    }
    let from = msg.from.as_ref()?;
    let user_id = user_id(from)?;

    let kind = if let Some(voice) = msg.voice() {
        InboundKind::Voice {
            file_handle: voice.file.id.to_string(),
            message_id: MessageId(msg.id.0.to_string()),
        }
    } else if let Some(text) = msg.text() {
        parse_command(text).unwrap_or_else(|| InboundKind::Text(text.to_string()))
    } else {
        debug!(msg_id = msg.id.0, "ignoring unsupported message type");
        return None;
    };

    Some(InboundEvent {
        user_id,
        handle: from.username.clone(),
        kind,
    })
}

/// Decodes an inline button press.
pub fn decode_callback(query: &CallbackQuery) -> Option<InboundEvent> {
    let data = query.data.as_deref()?;
    let action = match data.parse::<Action>() {
        Ok(action) => action,
        Err(e) => {
            debug!(error = %e, "ignoring callback");
            return None;
        }
    };
    Some(InboundEvent {
        user_id: user_id(&query.from)?,
        handle: query.from.username.clone(),
        kind: InboundKind::Action(action),
    })
}

/// Bot commands. `/start` may carry a referral code as its argument.
fn parse_command(text: &str) -> Option<InboundKind> {
    let rest = text.trim().strip_prefix('/')?;
    let (head, arg) = match rest.split_once(char::is_whitespace) {
        Some((head, arg)) => (head, arg.trim()),
        None => (rest, ""),
    };
    // Group-style addressing: `/status@voxpost_bot`.
    let command = head.split('@').next().unwrap_or(head).to_ascii_lowercase();

    let kind = match command.as_str() {
        "start" => InboundKind::Start {
            referral: (!arg.is_empty()).then(|| arg.to_string()),
        },
        "menu" => InboundKind::Action(Action::MainMenu),
        "post" => InboundKind::Action(Action::CreatePost),
        "status" => InboundKind::Action(Action::Status),
        "subscribe" => InboundKind::Action(Action::Subscribe),
        "cancel" => InboundKind::Action(Action::CancelSubscription),
        _ => return None,
    };
    Some(kind)
}

/// Events whose handling spans upstream calls and must not hold up the
/// chat's update queue.
pub fn runs_long(kind: &InboundKind) -> bool {
    matches!(
        kind,
        InboundKind::Action(Action::StartCreation | Action::ApplyEdits)
    )
}

#[cfg(test)]
mod tests {
    use voxpost_core::ContentKind;

    use super::*;

    fn sender(user_id: u64, username: Option<&str>) -> serde_json::Value {
        let mut from = serde_json::json!({
            "id": user_id,
            "is_bot": false,
            "first_name": "Test",
        });
        if let Some(name) = username {
            from["username"] = name.into();
        }
        from
    }

    /// Build a mock private chat message from JSON, matching Telegram Bot API structure.
    fn private_message(user_id: u64, username: Option<&str>, body: serde_json::Value) -> Message {
        let mut json = serde_json::json!({
            "message_id": 17,
            "date": 1700000000i64,
            "chat": {
                "id": user_id as i64,
                "type": "private",
                "first_name": "Test",
            },
            "from": sender(user_id, username),
        });
        for (key, value) in body.as_object().expect("body must be an object") {
            json[key] = value.clone();
        }
        serde_json::from_value(json).expect("failed to deserialize mock message")
    }

    fn text_message(text: &str) -> Message {
        private_message(12345, Some("alice"), serde_json::json!({ "text": text }))
    }

    fn kind_of(msg: &Message) -> InboundKind {
        decode_message(msg).expect("message should decode").kind
    }

    #[test]
    fn voice_message_carries_file_handle_and_id() {
        let msg = private_message(
            12345,
            Some("alice"),
            serde_json::json!({
                "voice": {
                    "file_id": "AwADBAADbXXXXXXXXXXX",
                    "file_unique_id": "AgADbX",
                    "duration": 4,
                    "mime_type": "audio/ogg",
                    "file_size": 2048,
                }
            }),
        );
        let event = decode_message(&msg).unwrap();
        assert_eq!(event.user_id, UserId(12345));
        assert_eq!(event.handle.as_deref(), Some("alice"));
        assert_eq!(
            event.kind,
            InboundKind::Voice {
                file_handle: "AwADBAADbXXXXXXXXXXX".into(),
                message_id: MessageId("17".into()),
            }
        );
    }

    #[test]
    fn start_with_and_without_referral() {
        assert_eq!(
            kind_of(&text_message("/start")),
            InboundKind::Start { referral: None }
        );
        assert_eq!(
            kind_of(&text_message("/start ref_ab12")),
            InboundKind::Start {
                referral: Some("ref_ab12".into())
            }
        );
    }

    #[test]
    fn commands_map_to_actions() {
        let cases = [
            ("/status", Action::Status),
            ("/subscribe", Action::Subscribe),
            ("/cancel", Action::CancelSubscription),
            ("/menu", Action::MainMenu),
            ("/post", Action::CreatePost),
            ("/Status@voxpost_bot", Action::Status),
        ];
        for (text, action) in cases {
            assert_eq!(kind_of(&text_message(text)), InboundKind::Action(action), "{text}");
        }
    }

    #[test]
    fn other_text_is_plain_text() {
        assert_eq!(
            kind_of(&text_message("hello there")),
            InboundKind::Text("hello there".into())
        );
        assert_eq!(
            kind_of(&text_message("/unknown")),
            InboundKind::Text("/unknown".into())
        );
    }

    #[test]
    fn group_messages_are_ignored() {
        let json = serde_json::json!({
            "message_id": 1,
            "date": 1700000000i64,
            "chat": {
                "id": -100123i64,
                "type": "supergroup",
                "title": "Test Group",
            },
            "from": sender(12345, None),
            "text": "/status",
        });
        let msg: Message = serde_json::from_value(json).unwrap();
        assert!(!is_dm(&msg));
        assert!(decode_message(&msg).is_none());
    }

    #[test]
    fn messages_without_sender_are_ignored() {
        let json = serde_json::json!({
            "message_id": 1,
            "date": 1700000000i64,
            "chat": {
                "id": 12345i64,
                "type": "private",
                "first_name": "Test",
            },
            "text": "hello",
        });
        let msg: Message = serde_json::from_value(json).unwrap();
        assert!(decode_message(&msg).is_none());
    }

    fn callback(data: &str) -> CallbackQuery {
        let json = serde_json::json!({
            "id": "4382bfdwdsb323b2d9",
            "from": sender(12345, Some("alice")),
            "chat_instance": "-5090617353290329361",
            "data": data,
        });
        serde_json::from_value(json).expect("failed to deserialize mock callback")
    }

    #[test]
    fn callback_data_decodes_to_action() {
        let event = decode_callback(&callback("kind:reels_script")).unwrap();
        assert_eq!(event.user_id, UserId(12345));
        assert_eq!(
            event.kind,
            InboundKind::Action(Action::PickKind(ContentKind::ReelsScript))
        );
        assert!(decode_callback(&callback("self_destruct")).is_none());
    }

    #[test]
    fn only_generation_runs_long() {
        assert!(runs_long(&InboundKind::Action(Action::StartCreation)));
        assert!(runs_long(&InboundKind::Action(Action::ApplyEdits)));
        assert!(!runs_long(&InboundKind::Action(Action::Approve)));
        assert!(!runs_long(&InboundKind::Text("hi".into())));
    }
}
