// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Order ids: `{prefix}_{userId}_{yyyymmddHHMMSS}`.

use chrono::{DateTime, Utc};
use voxpost_core::UserId;

/// Prefix for subscription-opening payments.
pub const SUBSCRIPTION_PREFIX: &str = "sub";
/// Prefix for one-off and recurring charges.
pub const PAYMENT_PREFIX: &str = "pay";

pub fn format_order_id(prefix: &str, user: UserId, at: DateTime<Utc>) -> String {
    format!("{prefix}_{}_{}", user.0, at.format("%Y%m%d%H%M%S"))
}

/// The user encoded in an order id (element [1] after splitting on `_`).
pub fn parse_order_user(order_id: &str) -> Option<UserId> {
    order_id
        .split('_')
        .nth(1)?
        .parse::<i64>()
        .ok()
        .map(UserId)
}
