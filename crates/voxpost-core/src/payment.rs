// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Acquirer payment objects.
//!
//! These mirror the acquirer's JSON payment resource closely so the same
//! value can be fetched, stored in logs and returned from the ops endpoints.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// Currency every amount is charged in.
pub const CURRENCY: &str = "RUB";

/// Monetary amount as the acquirer encodes it: a decimal string plus currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    pub value: String,
    pub currency: String,
}

impl Amount {
    /// Build an amount from minor units (kopecks).
    pub fn from_minor(minor: i64) -> Self {
        Self {
            value: format!("{}.{:02}", minor / 100, (minor % 100).abs()),
            currency: CURRENCY.to_string(),
        }
    }

    /// Minor units, or `None` if `value` is not a valid non-negative decimal.
    pub fn to_minor(&self) -> Option<i64> {
        parse_minor_units(&self.value)
    }
}

/// Parse `"990"`, `"990.5"` or `"990.00"` into minor units.
pub fn parse_minor_units(value: &str) -> Option<i64> {
    let value = value.trim();
    let (whole, frac) = match value.split_once('.') {
        Some((w, f)) => (w, f),
        None => (value, ""),
    };
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if frac.len() > 2 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let whole: i64 = whole.parse().ok()?;
    let frac: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().ok()? * 10,
        _ => frac.parse().ok()?,
    };
    whole.checked_mul(100)?.checked_add(frac)
}

/// Lifecycle status of a payment on the acquirer side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    WaitingForCapture,
    Succeeded,
    Canceled,
}

/// Saved or one-off payment method attached to a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub method_type: Option<String>,
    #[serde(default)]
    pub saved: bool,
}

/// Acquirer-side customer reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRef {
    pub id: String,
}

/// How the payer confirms the payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
}

/// Why the acquirer cancelled a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationDetails {
    #[serde(default)]
    pub party: String,
    #[serde(default)]
    pub reason: String,
}

/// Canonical payment resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub status: PaymentStatus,
    pub amount: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<Confirmation>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub paid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_details: Option<CancellationDetails>,
}

impl Payment {
    /// Metadata value rendered as a string. Numbers are accepted too.
    pub fn metadata_str(&self, key: &str) -> Option<String> {
        match self.metadata.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// The `user_id` recorded in metadata, if present and numeric.
    pub fn metadata_user_id(&self) -> Option<UserId> {
        self.metadata_str("user_id")?.trim().parse().ok().map(UserId)
    }

    /// Where the payer should be redirected to confirm.
    pub fn confirmation_url(&self) -> Option<&str> {
        self.confirmation.as_ref()?.confirmation_url.as_deref()
    }
}

/// First charge that also saves the card for recurring use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialPaymentRequest {
    pub user_id: UserId,
    pub amount_minor: i64,
    pub customer_id: String,
    pub return_url: String,
    pub description: String,
    pub order_id: String,
}

/// Charge against a saved payment method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurringPaymentRequest {
    pub user_id: UserId,
    pub amount_minor: i64,
    pub customer_id: String,
    pub payment_method_id: String,
    pub description: String,
    pub order_id: String,
}
