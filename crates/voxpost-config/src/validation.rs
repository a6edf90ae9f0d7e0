// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints serde cannot express. Every problem is
//! collected; validation does not stop at the first one.

use tracing::warn;

use crate::diagnostic::ConfigError;
use crate::model::{Mode, VoxpostConfig};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &VoxpostConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.log_level.as_str()) {
        errors.push(ConfigError::invalid(
            "log_level",
            format!(
                "`{}` is not one of {}",
                config.log_level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::invalid(
            "storage.database_path",
            "must not be empty",
        ));
    }
    if config.storage.has_unused_network_fields() {
        warn!("DB host/port/user/password are set but the embedded SQLite store ignores them");
    }

    let t = &config.transcription;
    if t.base_url.trim().is_empty() {
        errors.push(ConfigError::invalid("transcription.base_url", "must not be empty"));
    }
    if t.max_concurrency == 0 {
        errors.push(ConfigError::invalid(
            "transcription.max_concurrency",
            "must be at least 1",
        ));
    }
    if t.poll_interval_ms == 0 {
        errors.push(ConfigError::invalid(
            "transcription.poll_interval_ms",
            "must be at least 1",
        ));
    }
    if t.timeout_secs.saturating_mul(1_000) < t.poll_interval_ms {
        errors.push(ConfigError::invalid(
            "transcription.timeout_secs",
            "must be longer than one poll interval",
        ));
    }

    let llm = &config.llm;
    if !(0.0..=2.0).contains(&llm.temperature) {
        errors.push(ConfigError::invalid(
            "llm.temperature",
            format!("must be within 0.0..=2.0, got {}", llm.temperature),
        ));
    }
    if llm.max_tokens == 0 {
        errors.push(ConfigError::invalid("llm.max_tokens", "must be at least 1"));
    }
    if llm.max_concurrency == 0 {
        errors.push(ConfigError::invalid("llm.max_concurrency", "must be at least 1"));
    }

    if config.acquirer.subscription_amount_minor <= 0 {
        errors.push(ConfigError::invalid(
            "acquirer.subscription_amount_minor",
            "must be positive",
        ));
    }

    if config.gateway.enabled && config.gateway.port == 0 {
        errors.push(ConfigError::invalid("gateway.port", "must not be 0"));
    }

    if config.billing.renewal_interval_secs == Some(0) {
        errors.push(ConfigError::invalid(
            "billing.renewal_interval_secs",
            "must be at least 1",
        ));
    }
    if config.billing.period_days < 1 {
        errors.push(ConfigError::invalid("billing.period_days", "must be at least 1"));
    }
    if config.billing.max_failures == 0 {
        errors.push(ConfigError::invalid("billing.max_failures", "must be at least 1"));
    }

    if config.mode == Mode::Production {
        if config.telegram.bot_token.as_deref().is_none_or(|t| t.trim().is_empty()) {
            errors.push(ConfigError::invalid(
                "telegram.bot_token",
                "is required in production (BOT_TOKEN)",
            ));
        }
        if config.llm.api_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
            errors.push(ConfigError::invalid(
                "llm.api_key",
                "is required in production (LLM_API_KEY)",
            ));
        }
        if !config.acquirer.has_credentials() {
            errors.push(ConfigError::invalid(
                "acquirer",
                "shop_id and secret_key are required in production (ACQUIRER_SHOP_ID, ACQUIRER_SECRET_KEY)",
            ));
        }
        if config.gateway.enabled && config.gateway.webhook_secret.is_none() {
            warn!("gateway.webhook_secret is unset: webhook signatures will not be verified");
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
