// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;
use voxpost_core::VoxpostError;

/// Errors from subscription operations.
#[derive(Debug, Error)]
pub enum BillingError {
    /// The user already has an active (non-pending) subscription.
    #[error("user already has an active subscription")]
    AlreadySubscribed,

    #[error("user has no active subscription")]
    NotSubscribed,

    /// The subscription has no saved card to charge.
    #[error("no saved payment method for subscription {0}")]
    MissingPaymentMethod(i64),

    /// The acquirer accepted the request but no redirect URL came back.
    #[error("acquirer returned no confirmation URL for payment {0}")]
    MissingConfirmation(String),

    /// A recurring charge was declined or could not be made.
    #[error("charge failed: {0}")]
    ChargeFailed(String),

    #[error(transparent)]
    Core(#[from] VoxpostError),
}

impl BillingError {
    /// Whether the failure came from a cancelled task.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BillingError::Core(VoxpostError::Cancelled))
    }
}
