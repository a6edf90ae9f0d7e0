// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `voxpost config check`.

use voxpost_config::VoxpostConfig;
use voxpost_core::VoxpostError;

const REDACTED: &str = "[redacted]";

/// Print the validated configuration as TOML with every secret masked.
pub fn run_check(config: &VoxpostConfig) -> Result<(), VoxpostError> {
    let rendered = render_redacted(config)?;
    println!("{rendered}");
    eprintln!("voxpost: configuration is valid");
    Ok(())
}

fn render_redacted(config: &VoxpostConfig) -> Result<String, VoxpostError> {
    toml::to_string_pretty(&redacted(config))
        .map_err(|e| VoxpostError::Config(format!("cannot render configuration: {e}")))
}

fn redacted(config: &VoxpostConfig) -> VoxpostConfig {
    let mut out = config.clone();
    for secret in [
        &mut out.storage.password,
        &mut out.telegram.bot_token,
        &mut out.transcription.api_key,
        &mut out.llm.api_key,
        &mut out.acquirer.secret_key,
        &mut out.gateway.ops_token,
        &mut out.gateway.webhook_secret,
    ] {
        if secret.is_some() {
            *secret = Some(REDACTED.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_never_reach_the_output() {
        let mut config = VoxpostConfig::default();
        config.telegram.bot_token = Some("123:bot-secret".into());
        config.llm.api_key = Some("sk-llm-secret".into());
        config.acquirer.shop_id = Some("shop-1".into());
        config.acquirer.secret_key = Some("live_acquirer_secret".into());
        config.gateway.webhook_secret = Some("hook-secret".into());

        let out = render_redacted(&config).unwrap();
        for secret in ["bot-secret", "sk-llm-secret", "live_acquirer_secret", "hook-secret"] {
            assert!(!out.contains(secret), "{secret} leaked");
        }
        assert!(out.contains(REDACTED));
        // Identifiers that are not secrets stay visible.
        assert!(out.contains("shop-1"));
    }

    #[test]
    fn unset_secrets_stay_unset() {
        let out = redacted(&VoxpostConfig::default());
        assert!(out.gateway.ops_token.is_none());
        assert!(out.telegram.bot_token.is_none());
    }
}
