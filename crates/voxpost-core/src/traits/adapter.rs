// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity and lifecycle shared by every upstream collaborator.

use async_trait::async_trait;

use crate::error::VoxpostError;
use crate::types::{AdapterType, HealthStatus};

/// Implemented by storage, the transcription and LLM clients, the acquirer
/// client and the messenger. `/healthz` probes these through
/// [`health_check`](PluginAdapter::health_check) and `voxpost serve` calls
/// [`shutdown`](PluginAdapter::shutdown) on them in turn when it stops.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Short stable name used as the key in health reports and logs.
    fn name(&self) -> &str;

    fn version(&self) -> semver::Version;

    fn adapter_type(&self) -> AdapterType;

    /// Probe the upstream. Unreachable upstreams report
    /// `HealthStatus::Unhealthy` rather than an error.
    async fn health_check(&self) -> Result<HealthStatus, VoxpostError>;

    /// Release connections and flush state before the process exits.
    async fn shutdown(&self) -> Result<(), VoxpostError>;
}
