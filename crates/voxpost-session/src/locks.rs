// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user serialization through a fixed set of striped locks.

use tokio::sync::{Mutex, MutexGuard};
use voxpost_core::UserId;

pub const STRIPES: usize = 256;

pub struct StripedLocks {
    stripes: Vec<Mutex<()>>,
}

impl StripedLocks {
    pub fn new() -> Self {
        Self {
            stripes: (0..STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Stripe index for a user (Fibonacci hashing of the id).
    pub fn stripe(user: UserId) -> usize {
        ((user.0 as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15) >> 56) as usize
    }

    pub async fn lock(&self, user: UserId) -> MutexGuard<'_, ()> {
        self.stripes[Self::stripe(user)].lock().await
    }
}

impl Default for StripedLocks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn stripes_stay_in_range_and_spread() {
        let used: HashSet<usize> = (0..10_000).map(|i| StripedLocks::stripe(UserId(i))).collect();
        assert!(used.iter().all(|&s| s < STRIPES));
        assert!(used.len() > STRIPES / 2);
    }

    #[tokio::test]
    async fn same_user_is_serialized() {
        let locks = StripedLocks::new();
        let guard = locks.lock(UserId(7)).await;
        assert!(locks.stripes[StripedLocks::stripe(UserId(7))].try_lock().is_err());
        drop(guard);
        assert!(locks.stripes[StripedLocks::stripe(UserId(7))].try_lock().is_ok());
    }
}
