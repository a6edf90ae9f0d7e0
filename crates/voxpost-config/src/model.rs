// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Voxpost.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Voxpost configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VoxpostConfig {
    /// Deployment mode. Alters renewal cadence and credential strictness.
    #[serde(default)]
    pub mode: Mode,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub transcription: TranscriptionConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub acquirer: AcquirerConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub billing: BillingConfig,

    #[serde(default)]
    pub quota: QuotaConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub prompts: PromptsConfig,
}

impl Default for VoxpostConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            log_level: default_log_level(),
            storage: StorageConfig::default(),
            telegram: TelegramConfig::default(),
            transcription: TranscriptionConfig::default(),
            llm: LlmConfig::default(),
            acquirer: AcquirerConfig::default(),
            gateway: GatewayConfig::default(),
            billing: BillingConfig::default(),
            quota: QuotaConfig::default(),
            session: SessionConfig::default(),
            prompts: PromptsConfig::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Deployment mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    #[serde(alias = "development")]
    Dev,
    #[serde(alias = "prod")]
    Production,
}

/// SQLite storage configuration.
///
/// `host`, `port`, `user` and `password` exist so deployments exporting the
/// `DB_*` variables of a client/server database still load; the embedded
/// store ignores them.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            host: None,
            port: None,
            user: None,
            password: None,
        }
    }
}

impl StorageConfig {
    /// True when any of the client/server connection fields were supplied.
    pub fn has_unused_network_fields(&self) -> bool {
        self.host.is_some() || self.port.is_some() || self.user.is_some() || self.password.is_some()
    }
}

fn default_database_path() -> String {
    dirs::data_local_dir()
        .map(|d| d.join("voxpost").join("voxpost.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("voxpost.db"))
        .to_string_lossy()
        .into_owned()
}

/// Telegram bot integration configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Bot API token from BotFather.
    #[serde(default)]
    pub bot_token: Option<String>,
}

/// Which speech-to-text provider to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionProvider {
    /// Submit, poll, fetch.
    #[default]
    Polling,
    /// One request returns the text.
    Sync,
}

/// Speech-to-text client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TranscriptionConfig {
    #[serde(default)]
    pub provider: TranscriptionProvider,

    /// Endpoint base, e.g. `http://stt.internal:8090`.
    #[serde(default = "default_transcribe_url")]
    pub base_url: String,

    /// Optional bearer token.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Delay between status polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Wall-clock budget for one transcription.
    #[serde(default = "default_transcribe_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries on transport errors.
    #[serde(default = "default_transcribe_retries")]
    pub max_retries: u32,

    /// First backoff delay; doubles on each retry.
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    /// Process-wide cap on concurrent transcription calls.
    #[serde(default = "default_transcribe_concurrency")]
    pub max_concurrency: usize,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            provider: TranscriptionProvider::default(),
            base_url: default_transcribe_url(),
            api_key: None,
            poll_interval_ms: default_poll_interval_ms(),
            timeout_secs: default_transcribe_timeout_secs(),
            max_retries: default_transcribe_retries(),
            retry_base_ms: default_retry_base_ms(),
            max_concurrency: default_transcribe_concurrency(),
        }
    }
}

fn default_transcribe_url() -> String {
    "http://127.0.0.1:8090".to_string()
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_transcribe_timeout_secs() -> u64 {
    300
}

fn default_transcribe_retries() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    1_000
}

fn default_transcribe_concurrency() -> usize {
    8
}

/// LLM client configuration (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    #[serde(default = "default_llm_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,

    /// Bound on in-flight requests to the provider host.
    #[serde(default = "default_llm_concurrency")]
    pub max_concurrency: usize,

    /// Retries on 429/5xx before the error is surfaced.
    #[serde(default = "default_llm_retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_url(),
            api_key: None,
            model: default_llm_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
            max_concurrency: default_llm_concurrency(),
            max_retries: default_llm_retries(),
        }
    }
}

fn default_llm_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2_000
}

fn default_llm_timeout_secs() -> u64 {
    60
}

fn default_llm_concurrency() -> usize {
    16
}

fn default_llm_retries() -> u32 {
    2
}

/// Card acquirer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AcquirerConfig {
    #[serde(default = "default_acquirer_url")]
    pub base_url: String,

    #[serde(default)]
    pub shop_id: Option<String>,

    #[serde(default)]
    pub secret_key: Option<String>,

    /// Where the payer lands after confirming. `order_id` is appended.
    #[serde(default = "default_return_url")]
    pub return_url: String,

    #[serde(default = "default_acquirer_timeout_secs")]
    pub timeout_secs: u64,

    /// Subscription price in minor units.
    #[serde(default = "default_amount_minor")]
    pub subscription_amount_minor: i64,

    #[serde(default = "default_payment_description")]
    pub description: String,
}

impl Default for AcquirerConfig {
    fn default() -> Self {
        Self {
            base_url: default_acquirer_url(),
            shop_id: None,
            secret_key: None,
            return_url: default_return_url(),
            timeout_secs: default_acquirer_timeout_secs(),
            subscription_amount_minor: default_amount_minor(),
            description: default_payment_description(),
        }
    }
}

impl AcquirerConfig {
    pub fn has_credentials(&self) -> bool {
        self.shop_id.as_deref().is_some_and(|s| !s.trim().is_empty())
            && self.secret_key.as_deref().is_some_and(|s| !s.trim().is_empty())
    }
}

fn default_acquirer_url() -> String {
    "https://api.yookassa.ru/v3".to_string()
}

fn default_return_url() -> String {
    "http://127.0.0.1:8080/payment/success".to_string()
}

fn default_acquirer_timeout_secs() -> u64 {
    15
}

fn default_amount_minor() -> i64 {
    99_000
}

fn default_payment_description() -> String {
    "Voxpost monthly subscription".to_string()
}

/// Webhook and ops HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token for `/acquirer/init` and `/acquirer/charge`.
    /// Unset means those routes reject every request.
    #[serde(default)]
    pub ops_token: Option<String>,

    /// HMAC-SHA256 key for webhook signatures. Unset disables verification.
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
            ops_token: None,
            webhook_secret: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Subscription renewal configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BillingConfig {
    /// Sweep interval override. Defaults to 300 s in production and 30 s in dev.
    #[serde(default)]
    pub renewal_interval_secs: Option<u64>,

    #[serde(default = "default_period_days")]
    pub period_days: i64,

    /// Consecutive failed charges before a subscription expires.
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,

    /// How long a `pending` recurring charge is left to settle before retrying.
    #[serde(default = "default_pending_settle_hours")]
    pub pending_settle_hours: i64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            renewal_interval_secs: None,
            period_days: default_period_days(),
            max_failures: default_max_failures(),
            pending_settle_hours: default_pending_settle_hours(),
        }
    }
}

impl BillingConfig {
    /// Effective sweep interval for the given mode.
    pub fn renewal_interval(&self, mode: Mode) -> Duration {
        let secs = self.renewal_interval_secs.unwrap_or(match mode {
            Mode::Production => 300,
            Mode::Dev => 30,
        });
        Duration::from_secs(secs)
    }
}

fn default_period_days() -> i64 {
    30
}

fn default_max_failures() -> u32 {
    3
}

fn default_pending_settle_hours() -> i64 {
    24
}

/// Daily quota configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QuotaConfig {
    /// Approved posts per day on the free tariff.
    #[serde(default = "default_free_limit")]
    pub free_daily_limit: u32,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            free_daily_limit: default_free_limit(),
        }
    }
}

fn default_free_limit() -> u32 {
    5
}

/// Session engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Directory downloaded voice clips are written to.
    #[serde(default = "default_media_dir")]
    pub media_dir: String,

    /// Per-clip download budget.
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            media_dir: default_media_dir(),
            download_timeout_secs: default_download_timeout_secs(),
        }
    }
}

fn default_media_dir() -> String {
    std::env::temp_dir()
        .join("voxpost-media")
        .to_string_lossy()
        .into_owned()
}

fn default_download_timeout_secs() -> u64 {
    60
}

/// Prompt template configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PromptsConfig {
    /// JSON file overriding the built-in templates per content kind.
    #[serde(default)]
    pub path: Option<String>,

    /// Build edit prompts from the file's `edit.user` template instead of
    /// the fixed Original/Edits layout.
    #[serde(default)]
    pub edit_from_file: bool,
}
