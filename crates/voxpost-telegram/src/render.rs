// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound conversion from platform-neutral messages to Bot API types.

use reqwest::Url;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, MessageEntity, MessageEntityKind,
};
use tracing::warn;
use voxpost_core::format::utf16_len;
use voxpost_core::{ButtonTarget, EntityKind, FormattedText, Keyboard, TextEntity};

/// Longest text a single Bot API message may carry, in UTF-16 units.
pub const MAX_MESSAGE_LEN: usize = 4096;

pub fn to_entities(entities: &[TextEntity]) -> Vec<MessageEntity> {
    entities.iter().filter_map(to_entity).collect()
}

fn to_entity(entity: &TextEntity) -> Option<MessageEntity> {
    let kind = match entity.kind {
        EntityKind::Bold => MessageEntityKind::Bold,
        EntityKind::Italic => MessageEntityKind::Italic,
        EntityKind::Underline => MessageEntityKind::Underline,
        EntityKind::Strikethrough => MessageEntityKind::Strikethrough,
        EntityKind::Spoiler => MessageEntityKind::Spoiler,
        EntityKind::Code => MessageEntityKind::Code,
        EntityKind::Pre => MessageEntityKind::Pre { language: None },
        EntityKind::TextLink => {
            let raw = entity.url.as_deref()?;
            match Url::parse(raw) {
                Ok(url) => MessageEntityKind::TextLink { url },
                Err(e) => {
                    warn!(url = raw, error = %e, "dropping link entity with bad url");
                    return None;
                }
            }
        }
    };
    Some(MessageEntity::new(kind, entity.offset, entity.length))
}

pub fn to_markup(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    let rows = keyboard.rows.iter().map(|row| {
        row.iter()
            .filter_map(|button| match &button.target {
                ButtonTarget::Action(action) => Some(InlineKeyboardButton::callback(
                    button.label.clone(),
                    action.to_string(),
                )),
                ButtonTarget::Url(raw) => match Url::parse(raw) {
                    Ok(url) => Some(InlineKeyboardButton::url(button.label.clone(), url)),
                    Err(e) => {
                        warn!(url = %raw, error = %e, "dropping url button");
                        None
                    }
                },
            })
            .collect::<Vec<_>>()
    });
    InlineKeyboardMarkup::new(rows)
}

/// Splits text over `limit` UTF-16 units into several messages, cutting
/// after the last newline that fits when there is one. Entities are
/// clipped to the part they fall in and rebased.
pub fn split_message(text: &str, entities: &[TextEntity], limit: usize) -> Vec<FormattedText> {
    if utf16_len(text) <= limit {
        return vec![FormattedText {
            text: text.to_string(),
            entities: entities.to_vec(),
        }];
    }

    let mut parts = Vec::new();
    let mut rest = text;
    let mut base = 0;
    while !rest.is_empty() {
        let (head, tail) = rest.split_at(cut_point(rest, limit));
        let len = utf16_len(head);
        parts.push(FormattedText {
            text: head.to_string(),
            entities: entities
                .iter()
                .filter_map(|e| clip(e, base, len))
                .collect(),
        });
        base += len;
        rest = tail;
    }
    parts
}

/// Byte index to cut `s` at so the head fits in `limit` units.
fn cut_point(s: &str, limit: usize) -> usize {
    let mut units = 0;
    let mut last_newline = None;
    for (i, c) in s.char_indices() {
        if units + c.len_utf16() > limit {
            let cut = last_newline.unwrap_or(i);
            // A single char wider than the limit still goes out on its own.
            return if cut == 0 { c.len_utf8() } else { cut };
        }
        units += c.len_utf16();
        if c == '\n' {
            last_newline = Some(i + 1);
        }
    }
    s.len()
}

fn clip(entity: &TextEntity, base: usize, len: usize) -> Option<TextEntity> {
    let start = entity.offset.max(base);
    let end = (entity.offset + entity.length).min(base + len);
    (end > start).then(|| TextEntity {
        kind: entity.kind,
        offset: start - base,
        length: end - start,
        url: entity.url.clone(),
    })
}
