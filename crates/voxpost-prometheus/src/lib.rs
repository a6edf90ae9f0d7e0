// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics for Voxpost.
//!
//! Services record through the metrics-rs facade via the helpers in
//! [`recording`]; without an installed recorder those calls are no-ops.
//! The gateway's `/metrics` route renders the [`PrometheusAdapter`] handle.

pub mod recording;

use async_trait::async_trait;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use voxpost_core::{AdapterType, HealthStatus, PluginAdapter, VoxpostError};

pub use recording::{
    record_generation, record_internal_error, record_quota_charge, record_quota_rejection,
    record_renewal, record_transcription, record_webhook, set_active_sessions,
};

/// Installs the Prometheus recorder and keeps the render handle.
pub struct PrometheusAdapter {
    handle: PrometheusHandle,
}

impl PrometheusAdapter {
    /// Install the recorder globally. Only one recorder can exist per process.
    pub fn new() -> Result<Self, VoxpostError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            VoxpostError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();
        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    /// A handle that is not installed globally. Used where several
    /// recorders may coexist, such as tests.
    pub fn detached() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        Self {
            handle: recorder.handle(),
        }
    }

    pub fn handle(&self) -> PrometheusHandle {
        self.handle.clone()
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[async_trait]
impl PluginAdapter for PrometheusAdapter {
    fn name(&self) -> &str {
        "prometheus"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }

    async fn health_check(&self) -> Result<HealthStatus, VoxpostError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), VoxpostError> {
        Ok(())
    }
}
