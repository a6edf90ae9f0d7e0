// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session state: step, fragment buffers and the current post.

use std::fmt;
use std::path::PathBuf;

use voxpost_core::{ContentKind, MessageId, TextEntity};

/// Which buffer a generation consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Ingestion,
    Edit,
}

/// Position in the per-user state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Step {
    #[default]
    Idle,
    SelectingContentType,
    WaitingForVoice,
    /// Transcription and generation in flight for the given buffer.
    Generating(BatchKind),
    PendingApproval,
    EditingWaitingForVoice,
}

impl Step {
    /// The waiting step a batch returns to when generation fails.
    pub fn waiting_for(batch: BatchKind) -> Step {
        match batch {
            BatchKind::Ingestion => Step::WaitingForVoice,
            BatchKind::Edit => Step::EditingWaitingForVoice,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Idle => "idle",
            Step::SelectingContentType => "selecting_content_type",
            Step::WaitingForVoice => "waiting_for_voice",
            Step::Generating(_) => "generating",
            Step::PendingApproval => "pending_approval",
            Step::EditingWaitingForVoice => "editing_waiting_for_voice",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApprovalStatus {
    #[default]
    Idle,
    Pending,
    Editing,
    Approved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentStatus {
    Pending,
    Completed,
    Error,
}

/// One dictated voice clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentRecord {
    pub message_id: MessageId,
    pub file_handle: String,
    /// Set once the clip is on disk; cleared when the file is deleted.
    pub path: Option<PathBuf>,
    pub status: FragmentStatus,
    pub text: Option<String>,
    pub error: Option<String>,
    /// A download task owns this record's file.
    pub downloading: bool,
}

impl FragmentRecord {
    pub fn new(file_handle: impl Into<String>, message_id: MessageId) -> Self {
        Self {
            message_id,
            file_handle: file_handle.into(),
            path: None,
            status: FragmentStatus::Pending,
            text: None,
            error: None,
            downloading: true,
        }
    }

    /// Usable by a generation: already transcribed, or downloaded and waiting.
    pub fn is_ready(&self) -> bool {
        match self.status {
            FragmentStatus::Completed => self.text.is_some(),
            FragmentStatus::Pending => self.path.as_ref().is_some_and(|p| !p.as_os_str().is_empty()),
            FragmentStatus::Error => false,
        }
    }
}

/// Fragments in insertion order, keyed by file handle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentBuffer {
    records: Vec<FragmentRecord>,
}

impl FragmentBuffer {
    /// Insert a record, or refresh the one with the same handle in place.
    /// Returns `true` if the record is new.
    pub fn upsert(&mut self, file_handle: &str, message_id: MessageId) -> bool {
        match self.records.iter_mut().find(|r| r.file_handle == file_handle) {
            Some(existing) => {
                existing.message_id = message_id;
                false
            }
            None => {
                self.records.push(FragmentRecord::new(file_handle, message_id));
                true
            }
        }
    }

    pub fn get(&self, file_handle: &str) -> Option<&FragmentRecord> {
        self.records.iter().find(|r| r.file_handle == file_handle)
    }

    pub fn get_mut(&mut self, file_handle: &str) -> Option<&mut FragmentRecord> {
        self.records.iter_mut().find(|r| r.file_handle == file_handle)
    }

    pub fn remove(&mut self, file_handle: &str) -> Option<FragmentRecord> {
        let idx = self.records.iter().position(|r| r.file_handle == file_handle)?;
        Some(self.records.remove(idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = &FragmentRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Empty the buffer, returning the on-disk files it owned.
    pub fn drain_files(&mut self) -> Vec<PathBuf> {
        self.records.drain(..).filter_map(|r| r.path).collect()
    }
}

/// Emoji and hashtag toggles appended to the system prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormattingPrefs {
    pub emoji: bool,
    pub hashtags: bool,
}

impl Default for FormattingPrefs {
    fn default() -> Self {
        Self {
            emoji: true,
            hashtags: true,
        }
    }
}

impl FormattingPrefs {
    /// Prompt lines describing these preferences.
    pub fn instructions(&self) -> String {
        let emoji = if self.emoji {
            "Use emoji where they fit naturally."
        } else {
            "Do not use emoji."
        };
        let hashtags = if self.hashtags {
            "End with two to four relevant hashtags."
        } else {
            "Do not use hashtags."
        };
        format!("{emoji}\n{hashtags}")
    }
}

/// A generated post awaiting approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub kind: ContentKind,
    /// Clean text after entity parsing.
    pub text: String,
    pub entities: Vec<TextEntity>,
    /// Transcripts the post was generated from, in order.
    pub source_texts: Vec<String>,
    pub message_id: Option<MessageId>,
    pub transcription_ms: i64,
    pub generation_ms: i64,
}

/// Per-user conversational state. Lives in memory only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub step: Step,
    pub kind: Option<ContentKind>,
    pub ingestion: FragmentBuffer,
    pub edits: FragmentBuffer,
    pub approval: ApprovalStatus,
    /// Raw LLM output of the last generation.
    pub last_generated: Option<String>,
    pub post: Option<Post>,
    pub prefs: FormattingPrefs,
    /// Id of the generation allowed to commit. Zero when none is running.
    pub generation: u64,
}

impl Session {
    /// A new idle session that keeps the user's formatting preferences.
    pub fn fresh(prefs: FormattingPrefs) -> Self {
        Self {
            prefs,
            ..Self::default()
        }
    }

    pub fn buffer(&self, batch: BatchKind) -> &FragmentBuffer {
        match batch {
            BatchKind::Ingestion => &self.ingestion,
            BatchKind::Edit => &self.edits,
        }
    }

    pub fn buffer_mut(&mut self, batch: BatchKind) -> &mut FragmentBuffer {
        match batch {
            BatchKind::Ingestion => &mut self.ingestion,
            BatchKind::Edit => &mut self.edits,
        }
    }

    /// The buffer voice clips go to in the current step.
    pub fn active_batch(&self) -> Option<BatchKind> {
        match self.step {
            Step::WaitingForVoice => Some(BatchKind::Ingestion),
            Step::EditingWaitingForVoice => Some(BatchKind::Edit),
            _ => None,
        }
    }

    /// Whether the session carries nothing worth keeping in memory.
    pub fn is_blank(&self) -> bool {
        *self == Session::fresh(FormattingPrefs::default())
    }

    /// Every file still owned by either buffer.
    pub fn drain_all_files(&mut self) -> Vec<PathBuf> {
        let mut files = self.ingestion.drain_files();
        files.extend(self.edits.drain_files());
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: &str) -> MessageId {
        MessageId(id.to_string())
    }

    #[test]
    fn duplicate_handle_overwrites_in_place() {
        let mut buffer = FragmentBuffer::default();
        assert!(buffer.upsert("v1", msg("1")));
        assert!(buffer.upsert("v2", msg("2")));
        assert!(!buffer.upsert("v1", msg("3")));

        assert_eq!(buffer.len(), 2);
        let handles: Vec<_> = buffer.iter().map(|r| r.file_handle.as_str()).collect();
        assert_eq!(handles, ["v1", "v2"]);
        assert_eq!(buffer.get("v1").unwrap().message_id, msg("3"));
    }

    #[test]
    fn readiness_depends_on_status() {
        let mut record = FragmentRecord::new("v1", msg("1"));
        assert!(!record.is_ready());
        record.path = Some(PathBuf::from("/tmp/v1.oga"));
        assert!(record.is_ready());

        record.status = FragmentStatus::Error;
        assert!(!record.is_ready());

        record.status = FragmentStatus::Completed;
        record.path = None;
        record.text = Some("hello".into());
        assert!(record.is_ready());
    }

    #[test]
    fn drain_returns_owned_files() {
        let mut buffer = FragmentBuffer::default();
        buffer.upsert("v1", msg("1"));
        buffer.upsert("v2", msg("2"));
        buffer.get_mut("v1").unwrap().path = Some(PathBuf::from("/tmp/v1.oga"));

        assert_eq!(buffer.drain_files(), vec![PathBuf::from("/tmp/v1.oga")]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn prefs_render_prompt_lines() {
        let prefs = FormattingPrefs {
            emoji: false,
            hashtags: true,
        };
        let text = prefs.instructions();
        assert!(text.contains("Do not use emoji."));
        assert!(text.contains("hashtags"));
    }

    #[test]
    fn fresh_session_keeps_prefs_only() {
        let prefs = FormattingPrefs {
            emoji: false,
            hashtags: false,
        };
        let session = Session::fresh(prefs);
        assert_eq!(session.step, Step::Idle);
        assert_eq!(session.prefs, prefs);
        assert!(!session.is_blank());
        assert!(Session::default().is_blank());
    }
}
