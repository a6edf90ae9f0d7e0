// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Speech-to-text clients for Voxpost.
//!
//! Two providers implement [`TranscriptionAdapter`]:
//! - [`PollingTranscriber`] submits a job, polls its status and downloads
//!   the result once complete.
//! - [`DirectTranscriber`] posts the clip and receives the text in the same
//!   response.
//!
//! `transcription.provider` selects between them.

pub mod direct;
pub mod polling;
pub mod retry;
mod wire;

use std::sync::Arc;

use voxpost_config::model::{TranscriptionConfig, TranscriptionProvider};
use voxpost_core::{TranscriptionAdapter, TranscriptionFailure, VoxpostError};

pub use direct::DirectTranscriber;
pub use polling::PollingTranscriber;

/// Build the provider named in the configuration.
pub fn build_transcriber(
    config: &TranscriptionConfig,
) -> Result<Arc<dyn TranscriptionAdapter>, VoxpostError> {
    Ok(match config.provider {
        TranscriptionProvider::Polling => Arc::new(PollingTranscriber::new(config)?),
        TranscriptionProvider::Sync => Arc::new(DirectTranscriber::new(config)?),
    })
}

/// Shared HTTP client construction: bearer auth when a key is configured.
pub(crate) fn http_client(
    api_key: Option<&str>,
    timeout: std::time::Duration,
) -> Result<reqwest::Client, VoxpostError> {
    let mut headers = reqwest::header::HeaderMap::new();
    if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
        let value = reqwest::header::HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|e| VoxpostError::Config(format!("invalid transcription API key: {e}")))?;
        headers.insert(reqwest::header::AUTHORIZATION, value);
    }
    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .pool_idle_timeout(std::time::Duration::from_secs(90))
        .build()
        .map_err(|e| VoxpostError::Transcription {
            kind: TranscriptionFailure::Upstream,
            status: None,
            message: format!("failed to build HTTP client: {e}"),
        })
}

/// Map a transport-level failure.
pub(crate) fn transport_error(e: reqwest::Error) -> VoxpostError {
    let kind = if e.is_timeout() {
        TranscriptionFailure::Timeout
    } else {
        TranscriptionFailure::Upstream
    };
    VoxpostError::Transcription {
        kind,
        status: None,
        message: format!("HTTP request failed: {e}"),
    }
}

/// Map a non-success HTTP answer.
pub(crate) async fn status_error(response: reqwest::Response) -> VoxpostError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let kind = if status == reqwest::StatusCode::NOT_FOUND {
        TranscriptionFailure::NotFound
    } else {
        TranscriptionFailure::Upstream
    };
    VoxpostError::Transcription {
        kind,
        status: Some(status.as_u16()),
        message: format!("provider returned {status}: {body}"),
    }
}

/// Read an audio file, mapping I/O errors to `NotFound`.
pub(crate) async fn read_audio(path: &std::path::Path) -> Result<Vec<u8>, VoxpostError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| VoxpostError::Transcription {
            kind: TranscriptionFailure::NotFound,
            status: None,
            message: format!("cannot read {}: {e}", path.display()),
        })
}

pub(crate) fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio.ogg".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_selection_follows_config() {
        let mut config = TranscriptionConfig::default();
        let polling = build_transcriber(&config).unwrap();
        assert_eq!(polling.name(), "transcription-polling");

        config.provider = TranscriptionProvider::Sync;
        let direct = build_transcriber(&config).unwrap();
        assert_eq!(direct.name(), "transcription-direct");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = read_audio(std::path::Path::new("/nonexistent/v1.ogg"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VoxpostError::Transcription {
                kind: TranscriptionFailure::NotFound,
                ..
            }
        ));
    }
}
