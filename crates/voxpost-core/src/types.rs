// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and Voxpost services.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Platform-assigned user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a message on the messaging platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Commercial tier governing the daily quota ceiling.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Tariff {
    #[default]
    Free,
    Paid,
}

/// Target platform for a generated post. Selects the prompt template.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    TelegramPost,
    YoutubeScript,
    ReelsScript,
    InstagramPost,
}

impl ContentKind {
    /// All kinds, in menu order.
    pub const ALL: [ContentKind; 4] = [
        ContentKind::TelegramPost,
        ContentKind::YoutubeScript,
        ContentKind::ReelsScript,
        ContentKind::InstagramPost,
    ];

    /// Human-facing label used on buttons and confirmations.
    pub fn label(self) -> &'static str {
        match self {
            ContentKind::TelegramPost => "Telegram post",
            ContentKind::YoutubeScript => "YouTube script",
            ContentKind::ReelsScript => "Reels script",
            ContentKind::InstagramPost => "Instagram post",
        }
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

impl HealthStatus {
    /// Short machine-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "ok",
            HealthStatus::Degraded(_) => "degraded",
            HealthStatus::Unhealthy(_) => "unhealthy",
        }
    }
}

/// Identifies the type of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Messenger,
    Transcription,
    Llm,
    Acquirer,
    Storage,
    Observability,
}
