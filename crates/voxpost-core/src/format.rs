// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rich-text entity spans and the formatter seam.
//!
//! Offsets and lengths are measured in UTF-16 code units, which is what
//! messaging platforms expect for entity spans.

use serde::{Deserialize, Serialize};

/// Kind of a formatting span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Spoiler,
    Code,
    Pre,
    TextLink,
}

/// A single formatting span over the clean text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEntity {
    pub kind: EntityKind,
    /// Start in UTF-16 code units.
    pub offset: usize,
    /// Length in UTF-16 code units.
    pub length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Clean text plus the spans that style it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedText {
    pub text: String,
    pub entities: Vec<TextEntity>,
}

impl FormattedText {
    /// Unstyled text.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            entities: Vec::new(),
        }
    }
}

/// Maps raw LLM output to clean text and entity spans.
pub trait EntityFormatter: Send + Sync + 'static {
    fn format(&self, raw: &str) -> FormattedText;
}

/// Number of UTF-16 code units needed to encode `s`.
pub fn utf16_len(s: &str) -> usize {
    s.chars().map(char::len_utf16).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf16_len_counts_surrogate_pairs() {
        assert_eq!(utf16_len("abc"), 3);
        assert_eq!(utf16_len("é"), 1);
        // U+1F600 needs a surrogate pair.
        assert_eq!(utf16_len("😀"), 2);
    }

    #[test]
    fn text_link_keeps_url_in_json() {
        let entity = TextEntity {
            kind: EntityKind::TextLink,
            offset: 0,
            length: 4,
            url: Some("https://example.com".into()),
        };
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["kind"], "text_link");
        assert_eq!(json["url"], "https://example.com");
    }
}
