// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt templates per content kind.
//!
//! Built-in defaults cover every [`ContentKind`]. A JSON document shaped like
//!
//! ```json
//! { "telegram_post": { "system": "...", "user": "... {text}",
//!                      "edit": { "system": "...", "user": "{current_text} {new_text}" } } }
//! ```
//!
//! overrides them per kind; kinds it leaves out keep their defaults.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::info;
use voxpost_core::{ContentKind, VoxpostError};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EditTemplate {
    pub system: String,
    pub user: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PromptTemplate {
    pub system: String,
    /// Generation prompt, with a `{text}` placeholder.
    pub user: String,
    pub edit: EditTemplate,
}

const EDIT_SYSTEM: &str = "You revise social media drafts. Apply the author's spoken edits \
to the draft and return only the revised text, keeping the original language and tone.";

const EDIT_USER: &str = "Original:\n{current_text}\n\nEdits:\n{new_text}\n\nApply the edits.";

fn builtin(kind: ContentKind) -> PromptTemplate {
    let (system, user) = match kind {
        ContentKind::TelegramPost => (
            "You turn dictated voice notes into a Telegram channel post. Write in the language \
             of the notes. Keep it readable on a phone: short paragraphs, a strong first line. \
             Use **bold** and _italic_ sparingly for emphasis.",
            "Write a Telegram post from these voice notes:\n\n{text}",
        ),
        ContentKind::YoutubeScript => (
            "You turn dictated voice notes into a YouTube video script. Write in the language \
             of the notes. Open with a hook, structure the body into clear sections and close \
             with a call to action.",
            "Write a YouTube script from these voice notes:\n\n{text}",
        ),
        ContentKind::ReelsScript => (
            "You turn dictated voice notes into a short vertical video script of under a \
             minute. Write in the language of the notes. Hook in the first sentence, one idea, \
             punchy lines.",
            "Write a Reels script from these voice notes:\n\n{text}",
        ),
        ContentKind::InstagramPost => (
            "You turn dictated voice notes into an Instagram caption. Write in the language of \
             the notes. Lead with a hook line, keep paragraphs short and end with a question \
             that invites comments.",
            "Write an Instagram caption from these voice notes:\n\n{text}",
        ),
    };
    PromptTemplate {
        system: system.to_string(),
        user: user.to_string(),
        edit: EditTemplate {
            system: EDIT_SYSTEM.to_string(),
            user: EDIT_USER.to_string(),
        },
    }
}

/// Templates for every content kind.
#[derive(Debug, Clone)]
pub struct PromptStore {
    templates: HashMap<ContentKind, PromptTemplate>,
}

impl Default for PromptStore {
    fn default() -> Self {
        Self {
            templates: ContentKind::ALL.into_iter().map(|k| (k, builtin(k))).collect(),
        }
    }
}

impl PromptStore {
    /// Built-in defaults, overridden by the file at `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self, VoxpostError> {
        let mut store = Self::default();
        if let Some(path) = path {
            let raw = std::fs::read_to_string(path).map_err(|e| {
                VoxpostError::Config(format!("cannot read prompts file {}: {e}", path.display()))
            })?;
            let count = store.merge_json(&raw)?;
            info!(path = %path.display(), overrides = count, "prompt overrides loaded");
        }
        Ok(store)
    }

    /// Apply per-kind overrides from a JSON document. Returns how many kinds changed.
    pub fn merge_json(&mut self, raw: &str) -> Result<usize, VoxpostError> {
        let overrides: HashMap<ContentKind, PromptTemplate> = serde_json::from_str(raw)
            .map_err(|e| VoxpostError::Config(format!("invalid prompts file: {e}")))?;
        let count = overrides.len();
        self.templates.extend(overrides);
        Ok(count)
    }

    pub fn template(&self, kind: ContentKind) -> &PromptTemplate {
        // Every kind is seeded in Default and merge only replaces entries.
        &self.templates[&kind]
    }
}

/// Number transcripts in order: `Fragment 1: ...\n\nFragment 2: ...`.
pub fn concatenate(transcripts: &[String]) -> String {
    transcripts
        .iter()
        .enumerate()
        .map(|(i, t)| format!("Fragment {}: {}", i + 1, t.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// `(system, user)` for a first generation.
pub fn generation_prompt(template: &PromptTemplate, prefs: &str, transcripts: &str) -> (String, String) {
    (
        format!("{}\n\n{prefs}", template.system),
        template.user.replace("{text}", transcripts),
    )
}

/// `(system, user)` for an edit pass. Without `from_file` the user prompt
/// is always the standard `Original / Edits` form.
pub fn edit_prompt(
    template: &PromptTemplate,
    prefs: &str,
    current: &str,
    edits: &str,
    from_file: bool,
) -> (String, String) {
    let user_template = if from_file {
        template.edit.user.as_str()
    } else {
        EDIT_USER
    };
    (
        format!("{}\n\n{prefs}", template.edit.system),
        user_template
            .replace("{current_text}", current)
            .replace("{new_text}", edits),
    )
}
