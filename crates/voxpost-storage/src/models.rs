// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types for the persisted entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use voxpost_core::{ContentKind, Tariff, UserId};

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub handle: Option<String>,
    pub tariff: Tariff,
    /// Lifetime count of approved posts.
    pub usage_count: i64,
    pub last_usage: Option<String>,
    pub created_at: String,
    pub referral_code: Option<String>,
    pub referred_by: Option<UserId>,
    pub acq_customer_token: Option<String>,
    pub acq_method_token: Option<String>,
}

/// Subscription lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Cancelled,
    Expired,
}

/// A recurring-billing agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub user_id: UserId,
    /// Acquirer id of the payment that opened this subscription.
    pub subscription_id: Option<String>,
    pub tariff: Tariff,
    pub status: SubscriptionStatus,
    /// Price in minor units.
    pub amount: i64,
    pub next_payment: Option<DateTime<Utc>>,
    pub last_payment: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub acq_customer_token: Option<String>,
    pub acq_method_token: Option<String>,
    pub acq_last_payment_token: Option<String>,
    pub failure_count: u32,
    pub last_error: Option<String>,
}

/// An accepted post, written on approve/save or when a pending post is
/// abandoned through the main menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: i64,
    pub user_id: UserId,
    pub content_kind: ContentKind,
    /// Concatenated fragment transcripts the post was generated from.
    pub voice_text: String,
    pub response_text: String,
    pub is_saved: bool,
    pub transcription_ms: Option<i64>,
    pub generation_ms: Option<i64>,
    pub fragment_count: i64,
    pub created_at: String,
}

/// Fields needed to insert a [`PostRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub user_id: UserId,
    pub content_kind: ContentKind,
    pub voice_text: String,
    pub response_text: String,
    pub is_saved: bool,
    pub transcription_ms: Option<i64>,
    pub generation_ms: Option<i64>,
    pub fragment_count: i64,
}

/// Why a payment token was recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventKind {
    /// Webhook-driven activation.
    Activation,
    /// Successful recurring charge.
    Renewal,
}

/// One applied payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub payment_token: String,
    pub user_id: UserId,
    pub kind: PaymentEventKind,
    pub status: String,
    pub amount: i64,
    pub created_at: String,
}
