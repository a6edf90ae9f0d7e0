// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Markdown to Telegram entities.
//!
//! The LLM answers in loose Markdown. Instead of escaping it for
//! MarkdownV2 (which rejects the whole message on a single stray
//! character) the markers are stripped and replaced by entity spans over
//! the clean text. Offsets and lengths are UTF-16 code units.
//!
//! Recognised:
//! - `**bold**`, `__bold__` and `# heading` lines (rendered bold)
//! - `*italic*`, `_italic_`
//! - `~~strike~~`, `||spoiler||`
//! - `` `code` `` and fenced ```` ``` ```` blocks
//! - `[label](https://url)`
//!
//! Anything unclosed is kept literally.

use voxpost_core::format::utf16_len;
use voxpost_core::{EntityFormatter, EntityKind, FormattedText, TextEntity};

/// [`EntityFormatter`] for the Markdown dialect LLMs tend to emit.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownFormatter;

impl EntityFormatter for MarkdownFormatter {
    fn format(&self, raw: &str) -> FormattedText {
        let mut builder = Builder::default();
        builder.inline(raw.trim());
        builder.finish()
    }
}

/// Delimited spans, longest markers first.
const DELIMITERS: [(&str, EntityKind); 6] = [
    ("**", EntityKind::Bold),
    ("__", EntityKind::Bold),
    ("~~", EntityKind::Strikethrough),
    ("||", EntityKind::Spoiler),
    ("*", EntityKind::Italic),
    ("_", EntityKind::Italic),
];

#[derive(Default)]
struct Builder {
    text: String,
    /// Length of `text` in UTF-16 units.
    offset: usize,
    entities: Vec<TextEntity>,
    depth: usize,
}

impl Builder {
    fn push_str(&mut self, s: &str) {
        self.text.push_str(s);
        self.offset += utf16_len(s);
    }

    fn push_char(&mut self, c: char) {
        self.text.push(c);
        self.offset += c.len_utf16();
    }

    fn span(&mut self, kind: EntityKind, start: usize, url: Option<&str>) {
        if self.offset > start {
            self.entities.push(TextEntity {
                kind,
                offset: start,
                length: self.offset - start,
                url: url.map(str::to_string),
            });
        }
    }

    /// Parses `inner` as a nested span of `kind`.
    fn nested(&mut self, kind: EntityKind, inner: &str, url: Option<&str>) {
        let start = self.offset;
        self.depth += 1;
        self.inline(inner);
        self.depth -= 1;
        self.span(kind, start, url);
    }

    fn finish(mut self) -> FormattedText {
        // Outer spans before the spans they contain.
        self.entities
            .sort_by(|a, b| a.offset.cmp(&b.offset).then(b.length.cmp(&a.length)));
        FormattedText {
            text: self.text,
            entities: self.entities,
        }
    }

    fn inline(&mut self, src: &str) {
        let mut i = 0;
        while i < src.len() {
            if let Some(consumed) = self.try_span(src, i) {
                i += consumed;
                continue;
            }
            let Some(c) = src[i..].chars().next() else {
                break;
            };
            self.push_char(c);
            i += c.len_utf8();
        }
    }

    /// Consumes a construct starting at byte `i`, returning its byte length.
    fn try_span(&mut self, src: &str, i: usize) -> Option<usize> {
        let rest = &src[i..];
        let prev = src[..i].chars().next_back();

        if self.depth == 0 && (prev.is_none() || prev == Some('\n')) && rest.starts_with('#') {
            return self.heading(rest);
        }
        if rest.starts_with("```") {
            return self.fenced(rest);
        }
        if let Some(body) = rest.strip_prefix('`') {
            let end = body.find('`')?;
            if end == 0 || body[..end].contains('\n') {
                return None;
            }
            let start = self.offset;
            self.push_str(&body[..end]);
            self.span(EntityKind::Code, start, None);
            return Some(end + 2);
        }
        if rest.starts_with('[') {
            return self.link(rest);
        }
        DELIMITERS
            .iter()
            .find_map(|(marker, kind)| self.delimited(prev, rest, marker, *kind))
    }

    fn heading(&mut self, rest: &str) -> Option<usize> {
        let hashes = rest.bytes().take_while(|&b| b == b'#').count();
        if hashes > 6 {
            return None;
        }
        let line_end = rest.find('\n').unwrap_or(rest.len());
        let title = rest[hashes..line_end].strip_prefix(' ')?.trim();
        if title.is_empty() {
            return None;
        }
        self.nested(EntityKind::Bold, title, None);
        Some(line_end)
    }

    fn fenced(&mut self, rest: &str) -> Option<usize> {
        let body = &rest[3..];
        let end = body.find("```")?;
        let block = &body[..end];
        // A first line without spaces is a language tag.
        let code = match block.split_once('\n') {
            Some((tag, code)) if !tag.trim().contains(' ') => code,
            _ => block,
        };
        let code = code.strip_suffix('\n').unwrap_or(code);
        let start = self.offset;
        self.push_str(code);
        self.span(EntityKind::Pre, start, None);
        Some(3 + end + 3)
    }

    fn link(&mut self, rest: &str) -> Option<usize> {
        let close = rest.find("](")?;
        let label = &rest[1..close];
        let after = &rest[close + 2..];
        let end = after.find(')')?;
        let url = &after[..end];
        let valid = !label.is_empty()
            && !label.contains('\n')
            && (url.starts_with("https://") || url.starts_with("http://"))
            && !url.contains(char::is_whitespace);
        if !valid {
            return None;
        }
        self.nested(EntityKind::TextLink, label, Some(url));
        Some(close + 2 + end + 1)
    }

    fn delimited(
        &mut self,
        prev: Option<char>,
        rest: &str,
        marker: &str,
        kind: EntityKind,
    ) -> Option<usize> {
        let body = rest.strip_prefix(marker)?;
        if body.is_empty() || body.starts_with(char::is_whitespace) {
            return None;
        }
        let underscore = marker.starts_with('_');
        // snake_case identifiers are not emphasis.
        if underscore && prev.is_some_and(char::is_alphanumeric) {
            return None;
        }

        let mut from = 0;
        loop {
            let pos = body[from..].find(marker)? + from;
            let inner = &body[..pos];
            let after = &body[pos + marker.len()..];
            let closes = pos > 0
                && !inner.ends_with(char::is_whitespace)
                && !(marker.len() == 1 && after.starts_with(marker))
                && !(underscore && after.starts_with(char::is_alphanumeric));
            if closes {
                self.nested(kind, inner, None);
                return Some(marker.len() * 2 + pos);
            }
            from = pos + marker.len();
        }
    }
}
