// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Card acquirer adapter trait.

use async_trait::async_trait;

use crate::error::VoxpostError;
use crate::payment::{InitialPaymentRequest, Payment, RecurringPaymentRequest};
use crate::traits::adapter::PluginAdapter;

/// Payment operations against the card acquirer.
///
/// Mutating calls take a caller-supplied idempotency key so the same logical
/// intent can be retried without double charging.
#[async_trait]
pub trait AcquirerAdapter: PluginAdapter {
    /// Create a first payment that saves the card for later charges.
    async fn create_initial_payment(
        &self,
        request: &InitialPaymentRequest,
        idempotency_key: &str,
    ) -> Result<Payment, VoxpostError>;

    /// Charge a previously saved payment method.
    async fn create_recurring_payment(
        &self,
        request: &RecurringPaymentRequest,
        idempotency_key: &str,
    ) -> Result<Payment, VoxpostError>;

    /// Fetch the canonical payment object.
    async fn get_payment(&self, payment_id: &str) -> Result<Payment, VoxpostError>;
}
