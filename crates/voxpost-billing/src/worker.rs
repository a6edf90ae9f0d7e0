// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic renewal sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::coordinator::{RenewalOutcome, SubscriptionCoordinator};
use crate::error::BillingError;

/// Tally of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub due: usize,
    pub renewed: usize,
    pub pending: usize,
    pub failed: usize,
    pub expired: usize,
    pub errors: usize,
    pub downgraded: usize,
}

/// Single long-lived task charging due subscriptions on a ticker.
pub struct RenewalWorker {
    coordinator: Arc<SubscriptionCoordinator>,
    interval: Duration,
}

impl RenewalWorker {
    pub fn new(coordinator: Arc<SubscriptionCoordinator>, interval: Duration) -> Self {
        Self {
            coordinator,
            interval,
        }
    }

    /// Sweep every `interval` until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.interval.as_secs(), "renewal worker started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sweep_once(Utc::now(), &cancel).await {
                        Ok(report) if report.due > 0 || report.downgraded > 0 => {
                            info!(?report, "renewal sweep finished");
                        }
                        Ok(_) => debug!("renewal sweep: nothing due"),
                        Err(e) => warn!(error = %e, "renewal sweep failed"),
                    }
                }
                _ = cancel.cancelled() => {
                    info!("renewal worker shutting down");
                    break;
                }
            }
        }
    }

    /// Charge each due subscription once, in order, then downgrade lapsed
    /// cancellations.
    pub async fn sweep_once(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<SweepReport, BillingError> {
        let due = self.coordinator.due_for_renewal(now).await?;
        let mut report = SweepReport {
            due: due.len(),
            ..SweepReport::default()
        };

        for sub in &due {
            if cancel.is_cancelled() {
                return Ok(report);
            }
            let charged = tokio::select! {
                result = self.coordinator.charge_recurring(sub, now) => result,
                _ = cancel.cancelled() => return Ok(report),
            };
            match charged {
                Ok(RenewalOutcome::Renewed(_)) => report.renewed += 1,
                Ok(RenewalOutcome::Pending(_)) => report.pending += 1,
                Ok(RenewalOutcome::Failed { expired: true, .. }) => report.expired += 1,
                Ok(RenewalOutcome::Failed { .. }) => report.failed += 1,
                Err(e) if e.is_cancelled() => return Ok(report),
                Err(e) => {
                    report.errors += 1;
                    warn!(subscription_id = sub.id, user_id = %sub.user_id, error = %e, "renewal attempt errored");
                }
            }
        }

        report.downgraded = self.coordinator.downgrade_lapsed(now).await?.len();
        Ok(report)
    }
}
