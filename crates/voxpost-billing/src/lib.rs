// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subscription billing for Voxpost.
//!
//! [`SubscriptionCoordinator`] owns the subscription lifecycle and the
//! acquirer round-trips; [`RenewalWorker`] drives recurring charges on a
//! ticker.

pub mod coordinator;
pub mod error;
pub mod keys;
pub mod worker;

pub use coordinator::{
    ActivationOutcome, BillingSettings, Initiated, RenewalOutcome, SubscriptionCoordinator,
};
pub use error::BillingError;
pub use keys::IdempotencyKeys;
pub use worker::{RenewalWorker, SweepReport};
