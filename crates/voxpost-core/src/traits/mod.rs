// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod acquirer;
pub mod adapter;
pub mod llm;
pub mod messenger;
pub mod transcription;

pub use acquirer::AcquirerAdapter;
pub use adapter::PluginAdapter;
pub use llm::{CompletionRequest, LlmAdapter};
pub use messenger::MessengerAdapter;
pub use transcription::TranscriptionAdapter;
