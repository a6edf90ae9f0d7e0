// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversational session engine for Voxpost.
//!
//! Turns inbound messenger events into state transitions: voice fragments
//! are buffered and downloaded, transcribed in parallel, rewritten by the
//! LLM into a post, and accepted or edited by the user.

pub mod engine;
pub mod error;
pub mod locks;
pub mod pipeline;
pub mod prompts;
pub mod replies;
pub mod state;

pub use engine::{EngineDeps, EngineSettings, FormattingToggle, SessionEngine, media_file_name};
pub use error::{EngineError, ErrorClass};
pub use prompts::PromptStore;
pub use state::{ApprovalStatus, BatchKind, FormattingPrefs, FragmentStatus, Post, Session, Step};
