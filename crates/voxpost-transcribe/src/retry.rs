// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded retry with exponential backoff.

use std::future::Future;
use std::time::Duration;

use tracing::warn;
use voxpost_core::VoxpostError;

/// Run `operation`, retrying transient failures up to `max_retries` times.
///
/// The delay starts at `base` and doubles after every attempt
/// (1 s, 2 s, 4 s with the defaults). Permanent failures return at once.
pub async fn with_retry<F, Fut, T>(
    operation_name: &str,
    max_retries: u32,
    base: Duration,
    operation: F,
) -> Result<T, VoxpostError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, VoxpostError>>,
{
    let mut delay = base;
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_retries => {
                attempt += 1;
                warn!(
                    operation = operation_name,
                    attempt,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}
