// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Voxpost - turns voice notes into ready-to-publish social posts.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod config_cmd;
mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use voxpost_config::VoxpostConfig;

/// Voxpost - turns voice notes into ready-to-publish social posts.
#[derive(Parser, Debug)]
#[command(name = "voxpost", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the bot, the webhook gateway and the renewal worker.
    Serve,
    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Run a single subscription renewal sweep and exit.
    RenewOnce,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Validate and print the effective configuration, secrets redacted.
    Check,
}

fn load_config(path: Option<&PathBuf>) -> VoxpostConfig {
    let loaded = match path {
        Some(path) => voxpost_config::load_and_validate_path(path),
        None => voxpost_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            voxpost_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("voxpost: use --help for available commands");
        return;
    };
    let config = load_config(cli.config.as_ref());

    let result = match command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Config {
            action: ConfigAction::Check,
        } => config_cmd::run_check(&config),
        Commands::RenewOnce => serve::run_renew_once(config).await,
    };

    if let Err(e) = result {
        eprintln!("voxpost: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn subcommands_parse() {
        let cli = Cli::parse_from(["voxpost", "config", "check"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigAction::Check
            })
        ));

        let cli = Cli::parse_from(["voxpost", "--config", "/tmp/v.toml", "renew-once"]);
        assert!(matches!(cli.command, Some(Commands::RenewOnce)));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/v.toml")));
    }
}
