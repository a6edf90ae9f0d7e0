// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `voxpost serve` and `voxpost renew-once`.
//!
//! Wires storage, the quota gate, the upstream clients, the subscription
//! coordinator and the session engine together, then runs the Telegram
//! dispatcher, the webhook gateway and the renewal worker until a
//! shutdown signal arrives.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use voxpost_acquirer::AcquirerClient;
use voxpost_billing::{BillingSettings, RenewalWorker, SubscriptionCoordinator};
use voxpost_config::VoxpostConfig;
use voxpost_core::{PluginAdapter, VoxpostError};
use voxpost_gateway::{AuthConfig, GatewayState, HealthState, ServerConfig};
use voxpost_llm::ChatCompletionClient;
use voxpost_prometheus::PrometheusAdapter;
use voxpost_quota::QuotaGate;
use voxpost_session::{EngineDeps, EngineSettings, PromptStore, SessionEngine};
use voxpost_storage::Database;
use voxpost_telegram::{MarkdownFormatter, TelegramMessenger};

use crate::shutdown;

/// How long background tasks get to finish after the signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

async fn open_database(config: &VoxpostConfig) -> Result<Arc<Database>, VoxpostError> {
    if config.storage.has_unused_network_fields() {
        warn!("storage host/port/user/password are ignored by the embedded SQLite store");
    }
    let db = Database::open(&config.storage.database_path).await?;
    info!(path = %config.storage.database_path, "database ready");
    Ok(Arc::new(db))
}

fn coordinator(
    config: &VoxpostConfig,
    db: &Arc<Database>,
    acquirer: Arc<AcquirerClient>,
) -> Arc<SubscriptionCoordinator> {
    Arc::new(SubscriptionCoordinator::new(
        Arc::clone(db),
        acquirer,
        BillingSettings::from_config(config),
    ))
}

/// Runs the `voxpost serve` command.
pub async fn run_serve(config: VoxpostConfig) -> Result<(), VoxpostError> {
    init_tracing(&config.log_level);
    info!(mode = ?config.mode, "starting voxpost serve");

    let prometheus = Arc::new(PrometheusAdapter::new()?);
    let db = open_database(&config).await?;

    tokio::fs::create_dir_all(&config.session.media_dir)
        .await
        .map_err(|e| VoxpostError::Config(format!(
            "cannot create media dir {}: {e}",
            config.session.media_dir
        )))?;

    let quota = QuotaGate::new(Arc::clone(&db), &config.quota);
    let acquirer = Arc::new(AcquirerClient::new(&config.acquirer)?);
    let coordinator = coordinator(&config, &db, acquirer.clone());
    let transcriber = voxpost_transcribe::build_transcriber(&config.transcription)?;
    let llm = Arc::new(ChatCompletionClient::new(&config.llm)?);
    let messenger = Arc::new(TelegramMessenger::new(&config.telegram)?);
    let prompts = PromptStore::load(config.prompts.path.as_deref().map(Path::new))?;

    let cancel = shutdown::install_signal_handler();

    let engine = Arc::new(SessionEngine::new(
        EngineDeps {
            db: Arc::clone(&db),
            quota,
            billing: Arc::clone(&coordinator),
            transcriber: transcriber.clone(),
            llm: llm.clone(),
            messenger: messenger.clone(),
            formatter: Arc::new(MarkdownFormatter),
            prompts,
        },
        EngineSettings::from_config(&config),
        cancel.clone(),
    ));

    // Renewal worker.
    let worker = RenewalWorker::new(
        Arc::clone(&coordinator),
        config.billing.renewal_interval(config.mode),
    );
    let worker_handle = tokio::spawn(worker.run(cancel.clone()));

    // Webhook and ops gateway.
    let gateway_handle = if config.gateway.enabled {
        let services: Vec<Arc<dyn PluginAdapter>> = vec![
            db.clone(),
            transcriber.clone(),
            llm.clone(),
            acquirer.clone(),
        ];
        let mut health = HealthState::new(services);
        let render = Arc::clone(&prometheus);
        health.prometheus_render = Some(Arc::new(move || render.render()));

        let state = GatewayState {
            coordinator: Arc::clone(&coordinator),
            db: Arc::clone(&db),
            messenger: Some(messenger.clone()),
            webhook_secret: config.gateway.webhook_secret.clone(),
            auth: AuthConfig {
                ops_token: config.gateway.ops_token.clone(),
            },
            health,
        };
        let server_config = ServerConfig {
            host: config.gateway.host.clone(),
            port: config.gateway.port,
        };
        let gateway_cancel = cancel.clone();
        Some(tokio::spawn(async move {
            if let Err(e) =
                voxpost_gateway::start_server(&server_config, state, gateway_cancel.clone()).await
            {
                error!(error = %e, "gateway stopped with an error, shutting down");
                gateway_cancel.cancel();
            }
        }))
    } else {
        info!("gateway disabled");
        None
    };

    // Long polling runs on this task until shutdown.
    messenger.run(Arc::clone(&engine), cancel.clone()).await;
    cancel.cancel();

    if tokio::time::timeout(DRAIN_TIMEOUT, engine.drain_downloads())
        .await
        .is_err()
    {
        warn!("voice downloads still running at shutdown");
    }
    await_task("renewal worker", worker_handle).await;
    if let Some(handle) = gateway_handle {
        await_task("gateway", handle).await;
    }

    let adapters: [&dyn PluginAdapter; 4] = [&*messenger, &*llm, &*acquirer, &*db];
    for adapter in adapters {
        if let Err(e) = adapter.shutdown().await {
            warn!(adapter = adapter.name(), error = %e, "adapter shutdown failed");
        }
    }

    info!("voxpost serve shutdown complete");
    Ok(())
}

async fn await_task(name: &str, handle: tokio::task::JoinHandle<()>) {
    match tokio::time::timeout(DRAIN_TIMEOUT, handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(task = name, error = %e, "task panicked"),
        Err(_) => warn!(task = name, "task did not stop in time"),
    }
}

/// Runs the `voxpost renew-once` command: one sweep, then exit.
pub async fn run_renew_once(config: VoxpostConfig) -> Result<(), VoxpostError> {
    init_tracing(&config.log_level);

    let db = open_database(&config).await?;
    let acquirer = Arc::new(AcquirerClient::new(&config.acquirer)?);
    let coordinator = coordinator(&config, &db, acquirer);
    let worker = RenewalWorker::new(coordinator, config.billing.renewal_interval(config.mode));

    let cancel = shutdown::install_signal_handler();
    let report = worker
        .sweep_once(chrono::Utc::now(), &cancel)
        .await
        .map_err(|e| VoxpostError::Internal(format!("renewal sweep failed: {e}")))?;

    println!(
        "due={} renewed={} pending={} failed={} expired={} errors={} downgraded={}",
        report.due,
        report.renewed,
        report.pending,
        report.failed,
        report.expired,
        report.errors,
        report.downgraded
    );
    Ok(())
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("voxpost={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
