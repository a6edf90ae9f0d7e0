// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock speech-to-text adapter.
//!
//! Audio files written by [`MockMessenger`](crate::MockMessenger) contain
//! `audio:{file_handle}`; the transcriber answers per file handle.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use voxpost_core::{
    AdapterType, HealthStatus, PluginAdapter, TranscriptionAdapter, TranscriptionFailure,
    VoxpostError,
};

/// Scripted answer for one file handle.
#[derive(Debug, Clone)]
pub enum MockTranscript {
    Text(String),
    Fail {
        kind: TranscriptionFailure,
        status: Option<u16>,
    },
}

/// Mock transcriber. Unscripted handles transcribe to `"transcript of {handle}"`.
pub struct MockTranscriber {
    scripts: Mutex<HashMap<String, MockTranscript>>,
    delay: Mutex<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockTranscriber {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub async fn script(&self, file_handle: &str, answer: MockTranscript) {
        self.scripts
            .lock()
            .await
            .insert(file_handle.to_string(), answer);
    }

    pub async fn set_text(&self, file_handle: &str, text: &str) {
        self.script(file_handle, MockTranscript::Text(text.to_string()))
            .await;
    }

    /// Make `file_handle` fail with an upstream 502.
    pub async fn set_failure(&self, file_handle: &str) {
        self.script(
            file_handle,
            MockTranscript::Fail {
                kind: TranscriptionFailure::Upstream,
                status: Some(502),
            },
        )
        .await;
    }

    /// Hold every call for `delay` so concurrent calls overlap.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.lock().await = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed in flight at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Default for MockTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockTranscriber {
    fn name(&self) -> &str {
        "mock-transcriber"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transcription
    }

    async fn health_check(&self) -> Result<HealthStatus, VoxpostError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), VoxpostError> {
        Ok(())
    }
}

#[async_trait]
impl TranscriptionAdapter for MockTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<String, VoxpostError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let live = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(live, Ordering::SeqCst);

        let delay = *self.delay.lock().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let content = tokio::fs::read_to_string(audio).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let content = content.map_err(|e| VoxpostError::Transcription {
            kind: TranscriptionFailure::NotFound,
            status: None,
            message: format!("cannot read {}: {e}", audio.display()),
        })?;
        let handle = content.strip_prefix("audio:").unwrap_or(&content).to_string();

        match self.scripts.lock().await.get(&handle).cloned() {
            Some(MockTranscript::Text(text)) => Ok(text),
            Some(MockTranscript::Fail { kind, status }) => Err(VoxpostError::Transcription {
                kind,
                status,
                message: format!("scripted failure for {handle}"),
            }),
            None => Ok(format!("transcript of {handle}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn answers_by_file_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.oga");
        tokio::fs::write(&path, "audio:v1").await.unwrap();

        let mock = MockTranscriber::new();
        assert_eq!(mock.transcribe(&path).await.unwrap(), "transcript of v1");

        mock.set_text("v1", "hello world").await;
        assert_eq!(mock.transcribe(&path).await.unwrap(), "hello world");

        mock.set_failure("v1").await;
        assert!(mock.transcribe(&path).await.unwrap_err().is_transient());
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let mock = MockTranscriber::new();
        let err = mock.transcribe(Path::new("/nonexistent/x.oga")).await.unwrap_err();
        assert!(matches!(
            err,
            VoxpostError::Transcription {
                kind: TranscriptionFailure::NotFound,
                ..
            }
        ));
    }
}
