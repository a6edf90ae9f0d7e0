// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./voxpost.toml` > `~/.config/voxpost/voxpost.toml` >
//! `/etc/voxpost/voxpost.toml`, then the plain deployment variables (`MODE`,
//! `BOT_TOKEN`, `DB_NAME`, ...) and finally `VOXPOST_`-prefixed overrides.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::VoxpostConfig;

/// Plain environment names and the config keys they feed.
///
/// Figment lowercases env keys before mapping.
pub const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("mode", "mode"),
    ("log_level", "log_level"),
    ("db_name", "storage.database_path"),
    ("db_host", "storage.host"),
    ("db_port", "storage.port"),
    ("db_user", "storage.user"),
    ("db_password", "storage.password"),
    ("bot_token", "telegram.bot_token"),
    ("transcribe_url", "transcription.base_url"),
    ("llm_api_key", "llm.api_key"),
    ("acquirer_shop_id", "acquirer.shop_id"),
    ("acquirer_secret_key", "acquirer.secret_key"),
    ("acquirer_return_url", "acquirer.return_url"),
];

/// Config sections addressable through `VOXPOST_<SECTION>_<KEY>`.
const SECTIONS: &[&str] = &[
    "storage",
    "telegram",
    "transcription",
    "llm",
    "acquirer",
    "gateway",
    "billing",
    "quota",
    "session",
    "prompts",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/voxpost/voxpost.toml` (system-wide)
/// 3. `~/.config/voxpost/voxpost.toml` (user XDG config)
/// 4. `./voxpost.toml` (local directory)
/// 5. Plain deployment variables (`MODE`, `BOT_TOKEN`, ...)
/// 6. `VOXPOST_*` environment variables
pub fn load_config() -> Result<VoxpostConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no environment).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<VoxpostConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(VoxpostConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<VoxpostConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(VoxpostConfig::default()))
        .merge(Toml::file(path))
        .merge(legacy_env_provider())
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(VoxpostConfig::default()))
        .merge(Toml::file("/etc/voxpost/voxpost.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("voxpost/voxpost.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("voxpost.toml"))
        .merge(legacy_env_provider())
        .merge(env_provider())
}

/// Provider for the un-prefixed deployment variables.
fn legacy_env_provider() -> Env {
    let names: Vec<&str> = LEGACY_ENV_KEYS.iter().map(|(env, _)| *env).collect();
    Env::raw().only(&names).map(|key| {
        let key_str = key.as_str();
        LEGACY_ENV_KEYS
            .iter()
            .find(|(env, _)| *env == key_str)
            .map(|(_, target)| (*target).to_string())
            .unwrap_or_else(|| key_str.to_string())
            .into()
    })
}

/// Provider for `VOXPOST_`-prefixed variables.
///
/// Uses `Env::map()` rather than `Env::split("_")` because keys contain
/// underscores: `VOXPOST_TELEGRAM_BOT_TOKEN` must become `telegram.bot_token`.
fn env_provider() -> Env {
    Env::prefixed("VOXPOST_").map(|key| section_key(key.as_str()).into())
}

/// `"llm_api_key"` -> `"llm.api_key"`; unknown sections pass through.
fn section_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
