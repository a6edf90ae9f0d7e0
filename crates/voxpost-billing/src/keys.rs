// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use voxpost_core::UserId;

/// Issues `{user}-{nanoseconds}` idempotency keys.
///
/// Stamps are strictly increasing within the process even if the wall
/// clock stalls or steps back, so two intents never share a key.
#[derive(Debug, Default)]
pub struct IdempotencyKeys {
    last: AtomicI64,
}

impl IdempotencyKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self, user: UserId) -> String {
        let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let stamp = now.max(prev.saturating_add(1));
            match self
                .last
                .compare_exchange_weak(prev, stamp, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return format!("{}-{stamp}", user.0),
                Err(actual) => prev = actual,
            }
        }
    }

    /// Key for charging the billing period that falls due at `due`.
    ///
    /// Every retry of the same period, including retries after a restart,
    /// sends the same key, so the acquirer answers a repeat with the payment
    /// it already made.
    pub fn for_period(user: UserId, due: DateTime<Utc>) -> String {
        let stamp = due.timestamp_nanos_opt().unwrap_or(i64::MAX);
        format!("{}-{stamp}", user.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn keys_are_unique_and_prefixed() {
        let keys = IdempotencyKeys::new();
        let issued: HashSet<String> = (0..1000).map(|_| keys.next(UserId(42))).collect();
        assert_eq!(issued.len(), 1000);
        assert!(issued.iter().all(|k| k.starts_with("42-")));
    }

    #[test]
    fn period_keys_depend_only_on_the_due_date() {
        let due = DateTime::from_timestamp(1_800_000_000, 0).unwrap();
        let a = IdempotencyKeys::for_period(UserId(88), due);
        assert_eq!(a, IdempotencyKeys::for_period(UserId(88), due));
        assert_eq!(a, "88-1800000000000000000");
        assert_ne!(
            a,
            IdempotencyKeys::for_period(UserId(88), due + chrono::Duration::days(30))
        );
    }

    #[test]
    fn stamps_increase() {
        let keys = IdempotencyKeys::new();
        let stamp = |k: String| k.split_once('-').unwrap().1.parse::<i64>().unwrap();
        let a = stamp(keys.next(UserId(1)));
        let b = stamp(keys.next(UserId(1)));
        assert!(b > a);
    }
}
