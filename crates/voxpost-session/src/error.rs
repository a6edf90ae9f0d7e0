// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;
use voxpost_billing::BillingError;
use voxpost_core::VoxpostError;

use crate::state::Step;

/// Coarse class of an [`EngineError`], used for logging and replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    UserInput,
    QuotaExceeded,
    UpstreamTransient,
    UpstreamPermanent,
    Internal,
    Cancelled,
}

/// Errors from session handlers.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("`{action}` is not allowed in state {step}")]
    InvalidTransition { step: Step, action: &'static str },

    #[error("no voice fragments to process")]
    EmptyBuffer,

    #[error("a voice fragment has not finished downloading")]
    FragmentNotReady,

    #[error("generation already in progress")]
    AlreadyGenerating,

    #[error("daily quota of {limit} posts exhausted")]
    QuotaExceeded { limit: u32 },

    /// No fragment could be transcribed, or the model returned nothing.
    #[error("generation failed: {0}")]
    GenerationFailed(String),

    #[error("upstream unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("upstream rejected the request: {0}")]
    UpstreamPermanent(String),

    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl EngineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::InvalidTransition { .. }
            | EngineError::EmptyBuffer
            | EngineError::FragmentNotReady
            | EngineError::AlreadyGenerating => ErrorClass::UserInput,
            EngineError::QuotaExceeded { .. } => ErrorClass::QuotaExceeded,
            EngineError::GenerationFailed(_) | EngineError::ServiceUnavailable(_) => {
                ErrorClass::UpstreamTransient
            }
            EngineError::UpstreamPermanent(_) => ErrorClass::UpstreamPermanent,
            EngineError::Billing(BillingError::AlreadySubscribed | BillingError::NotSubscribed) => {
                ErrorClass::UserInput
            }
            EngineError::Billing(e) if e.is_cancelled() => ErrorClass::Cancelled,
            EngineError::Billing(BillingError::Core(e)) if e.is_transient() => {
                ErrorClass::UpstreamTransient
            }
            EngineError::Billing(_) => ErrorClass::UpstreamPermanent,
            EngineError::Internal(_) => ErrorClass::Internal,
            EngineError::Cancelled => ErrorClass::Cancelled,
        }
    }
}

impl From<VoxpostError> for EngineError {
    fn from(e: VoxpostError) -> Self {
        match e {
            VoxpostError::Cancelled => EngineError::Cancelled,
            VoxpostError::EmptyCompletion => EngineError::GenerationFailed(e.to_string()),
            VoxpostError::Storage { .. } | VoxpostError::Internal(_) | VoxpostError::Config(_) => {
                EngineError::Internal(e.to_string())
            }
            e if e.is_transient() => EngineError::ServiceUnavailable(e.to_string()),
            e => EngineError::UpstreamPermanent(e.to_string()),
        }
    }
}
