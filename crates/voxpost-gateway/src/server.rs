// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use voxpost_billing::SubscriptionCoordinator;
use voxpost_core::{MessengerAdapter, PluginAdapter, VoxpostError};
use voxpost_storage::Database;

use crate::auth::{AuthConfig, ops_auth_middleware};
use crate::handlers;

/// State behind `/healthz` and `/metrics`.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Adapters whose health checks are aggregated.
    pub services: Vec<Arc<dyn PluginAdapter>>,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

impl HealthState {
    pub fn new(services: Vec<Arc<dyn PluginAdapter>>) -> Self {
        Self {
            start_time: std::time::Instant::now(),
            services,
            prometheus_render: None,
        }
    }
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub coordinator: Arc<SubscriptionCoordinator>,
    pub db: Arc<Database>,
    /// Used to tell users about payment outcomes. Optional so the gateway
    /// can run without a bot attached.
    pub messenger: Option<Arc<dyn MessengerAdapter>>,
    /// HMAC key for webhook signatures. `None` skips verification.
    pub webhook_secret: Option<String>,
    pub auth: AuthConfig,
    pub health: HealthState,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// All gateway routes.
///
/// - POST /acquirer/webhook (HMAC signature when configured)
/// - POST /acquirer/init, POST /acquirer/charge (bearer token)
/// - GET /payment/success, GET /payment/fail
/// - GET /healthz, GET /metrics
pub fn router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/acquirer/webhook", post(handlers::post_webhook))
        .route("/payment/success", get(handlers::get_payment_success))
        .route("/payment/fail", get(handlers::get_payment_fail))
        .route("/healthz", get(handlers::get_healthz))
        .route("/metrics", get(handlers::get_metrics))
        .with_state(state.clone());

    let ops_routes = Router::new()
        .route("/acquirer/init", post(handlers::post_ops_init))
        .route("/acquirer/charge", post(handlers::post_ops_charge))
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            ops_auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(ops_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind and serve until `cancel` fires.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), VoxpostError> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| VoxpostError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| VoxpostError::Channel {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway stopped");
    Ok(())
}
