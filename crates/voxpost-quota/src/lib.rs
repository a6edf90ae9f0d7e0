// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Daily quota enforcement.
//!
//! Free users get `quota.free_daily_limit` approved posts per UTC calendar
//! day; paid users are unbounded. Counters live in the `daily_usage` table,
//! so a new date starts from zero and enforcement survives restarts.
//! Only approval and save charge the quota.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;
use voxpost_config::model::QuotaConfig;
use voxpost_core::{Tariff, UserId, VoxpostError};
use voxpost_storage::Database;
use voxpost_storage::queries::{usage, users};

/// Outcome of a quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaDecision {
    pub allowed: bool,
    /// Posts left today; `None` means unbounded.
    pub remaining: Option<u32>,
    pub tariff: Tariff,
}

/// Check-and-increment gate over the daily usage counter.
#[derive(Clone)]
pub struct QuotaGate {
    db: Arc<Database>,
    free_daily_limit: u32,
}

impl QuotaGate {
    pub fn new(db: Arc<Database>, config: &QuotaConfig) -> Self {
        Self {
            db,
            free_daily_limit: config.free_daily_limit,
        }
    }

    /// Daily ceiling for a tariff.
    pub fn ceiling(&self, tariff: Tariff) -> Option<u32> {
        match tariff {
            Tariff::Free => Some(self.free_daily_limit),
            Tariff::Paid => None,
        }
    }

    /// Non-mutating check against today's counter.
    pub async fn check(&self, user: UserId) -> Result<QuotaDecision, VoxpostError> {
        self.check_on(user, Utc::now().date_naive()).await
    }

    pub async fn check_on(&self, user: UserId, date: NaiveDate) -> Result<QuotaDecision, VoxpostError> {
        let tariff = users::get_user(&self.db, user)
            .await?
            .map(|u| u.tariff)
            .unwrap_or_default();
        let Some(ceiling) = self.ceiling(tariff) else {
            return Ok(QuotaDecision {
                allowed: true,
                remaining: None,
                tariff,
            });
        };

        let used = usage::usage_on(&self.db, user, date).await?;
        let remaining = ceiling.saturating_sub(used);
        let decision = QuotaDecision {
            allowed: remaining > 0,
            remaining: Some(remaining),
            tariff,
        };
        if !decision.allowed {
            voxpost_prometheus::record_quota_rejection();
            debug!(user_id = %user, used, ceiling, "daily quota exhausted");
        }
        Ok(decision)
    }

    /// Count one accepted post against today. Returns today's new total.
    pub async fn charge(&self, user: UserId) -> Result<u32, VoxpostError> {
        self.charge_at(user, Utc::now()).await
    }

    pub async fn charge_at(&self, user: UserId, at: DateTime<Utc>) -> Result<u32, VoxpostError> {
        let count =
            usage::increment_usage(&self.db, user, at.date_naive(), &voxpost_storage::fmt_ts(at))
                .await?;
        voxpost_prometheus::record_quota_charge();
        debug!(user_id = %user, count, "quota charged");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    async fn gate(limit: u32) -> (tempfile::TempDir, Arc<Database>, QuotaGate) {
        let dir = tempdir().unwrap();
        let db = Arc::new(
            Database::open(dir.path().join("q.db").to_str().unwrap())
                .await
                .unwrap(),
        );
        let gate = QuotaGate::new(
            db.clone(),
            &QuotaConfig {
                free_daily_limit: limit,
            },
        );
        (dir, db, gate)
    }

    #[tokio::test]
    async fn charge_reduces_remaining_by_one() {
        let (_dir, db, gate) = gate(5).await;
        users::ensure_user(&db, UserId(1), None).await.unwrap();

        let before = gate.check(UserId(1)).await.unwrap();
        assert_eq!(before.remaining, Some(5));
        gate.charge(UserId(1)).await.unwrap();
        let after = gate.check(UserId(1)).await.unwrap();
        assert_eq!(after.remaining, Some(4));
        assert!(after.allowed);
    }

    #[tokio::test]
    async fn free_user_is_refused_at_ceiling() {
        let (_dir, db, gate) = gate(2).await;
        users::ensure_user(&db, UserId(2), None).await.unwrap();
        gate.charge(UserId(2)).await.unwrap();
        gate.charge(UserId(2)).await.unwrap();

        let decision = gate.check(UserId(2)).await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, Some(0));
    }

    #[tokio::test]
    async fn paid_user_is_unbounded() {
        let (_dir, db, gate) = gate(1).await;
        users::ensure_user(&db, UserId(3), None).await.unwrap();
        users::set_tariff(&db, UserId(3), Tariff::Paid).await.unwrap();
        for _ in 0..3 {
            gate.charge(UserId(3)).await.unwrap();
        }
        let decision = gate.check(UserId(3)).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining, None);
    }

    #[tokio::test]
    async fn date_rollover_starts_fresh() {
        let (_dir, db, gate) = gate(1).await;
        users::ensure_user(&db, UserId(4), None).await.unwrap();
        let yesterday = Utc::now() - Duration::days(1);
        gate.charge_at(UserId(4), yesterday).await.unwrap();

        assert!(!gate.check_on(UserId(4), yesterday.date_naive()).await.unwrap().allowed);
        assert!(gate.check(UserId(4)).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn unknown_user_is_treated_as_free() {
        let (_dir, _db, gate) = gate(5).await;
        let decision = gate.check(UserId(999)).await.unwrap();
        assert_eq!(decision.tariff, Tariff::Free);
        assert_eq!(decision.remaining, Some(5));
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(16))]

            /// Charging only when `check` allows never pushes a free user
            /// past the ceiling.
            #[test]
            fn usage_never_exceeds_ceiling(limit in 1u32..8, attempts in 0usize..20) {
                let rt = tokio::runtime::Builder::new_multi_thread()
                    .enable_all()
                    .build()
                    .unwrap();
                rt.block_on(async {
                    let (_dir, db, gate) = gate(limit).await;
                    users::ensure_user(&db, UserId(7), None).await.unwrap();
                    for _ in 0..attempts {
                        if gate.check(UserId(7)).await.unwrap().allowed {
                            gate.charge(UserId(7)).await.unwrap();
                        }
                    }
                    let used = usage::usage_on(&db, UserId(7), Utc::now().date_naive())
                        .await
                        .unwrap();
                    prop_assert!(used <= limit);
                    prop_assert_eq!(used as usize, attempts.min(limit as usize));
                    Ok(())
                })?;
            }
        }
    }
}
