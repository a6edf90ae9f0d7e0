// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types shared by every Voxpost adapter and service.

use thiserror::Error;

/// Why a transcription did not produce text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum TranscriptionFailure {
    /// The job did not finish inside the wall-clock budget.
    Timeout,
    /// The provider failed or returned an error status.
    Upstream,
    /// The job or file was unknown to the provider.
    NotFound,
}

/// The primary error type used across all Voxpost adapter traits and core operations.
#[derive(Debug, Error)]
pub enum VoxpostError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Messaging channel errors (send failure, media download, rate limiting).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// LLM provider errors (API failure, rejected request).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        status: Option<u16>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The LLM answered successfully but without any text.
    #[error("provider returned an empty completion")]
    EmptyCompletion,

    /// Speech-to-text errors.
    #[error("transcription {kind}: {message}")]
    Transcription {
        kind: TranscriptionFailure,
        status: Option<u16>,
        message: String,
    },

    /// Card acquirer errors.
    #[error("acquirer error: {message}")]
    Acquirer {
        message: String,
        status: Option<u16>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// The surrounding task was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl VoxpostError {
    /// Shorthand for a provider error without an HTTP status.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// Shorthand for an acquirer error without an HTTP status.
    pub fn acquirer(message: impl Into<String>) -> Self {
        Self::Acquirer {
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// Shorthand for a channel error without a source.
    pub fn channel(message: impl Into<String>) -> Self {
        Self::Channel {
            message: message.into(),
            source: None,
        }
    }

    /// Returns `true` if retrying the same call later may succeed.
    ///
    /// Network failures, timeouts, 429 and 5xx answers are transient.
    /// Any other 4xx answer is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Storage { .. } | Self::Channel { .. } => true,
            Self::Provider { status, .. } | Self::Acquirer { status, .. } => {
                status.is_none_or(is_transient_status)
            }
            Self::Transcription { kind, status, .. } => match kind {
                TranscriptionFailure::Timeout => true,
                TranscriptionFailure::NotFound => false,
                TranscriptionFailure::Upstream => status.is_none_or(is_transient_status),
            },
            Self::EmptyCompletion => true,
            Self::Config(_) | Self::Cancelled | Self::Internal(_) => false,
        }
    }
}

/// Status codes worth retrying.
pub fn is_transient_status(status: u16) -> bool {
    status == 408 || status == 429 || status >= 500
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        let err = VoxpostError::Provider {
            message: "boom".into(),
            status: Some(503),
            source: None,
        };
        assert!(err.is_transient());
    }

    #[test]
    fn bad_request_is_permanent() {
        let err = VoxpostError::Acquirer {
            message: "invalid amount".into(),
            status: Some(400),
            source: None,
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn transport_failure_without_status_is_transient() {
        assert!(VoxpostError::provider("connection reset").is_transient());
    }

    #[test]
    fn missing_transcription_is_permanent() {
        let err = VoxpostError::Transcription {
            kind: TranscriptionFailure::NotFound,
            status: Some(404),
            message: "no such job".into(),
        };
        assert!(!err.is_transient());
        assert_eq!(err.to_string(), "transcription not_found: no such job");
    }

    #[test]
    fn cancellation_is_not_retried() {
        assert!(!VoxpostError::Cancelled.is_transient());
    }
}
