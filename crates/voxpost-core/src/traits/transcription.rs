// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Speech-to-text adapter trait.

use std::path::Path;

use async_trait::async_trait;

use crate::error::VoxpostError;
use crate::traits::adapter::PluginAdapter;

/// Turns a downloaded audio file into text.
///
/// Implementations own their retry and timeout policy. Failures are reported
/// as [`VoxpostError::Transcription`] so callers can tell timeouts, upstream
/// failures and unknown jobs apart.
#[async_trait]
pub trait TranscriptionAdapter: PluginAdapter {
    async fn transcribe(&self, audio: &Path) -> Result<String, VoxpostError>;
}
