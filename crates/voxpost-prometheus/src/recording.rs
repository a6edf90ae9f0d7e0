// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all Voxpost metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "voxpost_generations_total",
        "Post generations by result (ok, failed, unavailable)"
    );
    describe_counter!(
        "voxpost_transcriptions_total",
        "Fragment transcriptions by result"
    );
    describe_histogram!(
        "voxpost_generation_duration_seconds",
        "Wall time from start of transcription to finished post"
    );
    describe_counter!("voxpost_quota_charges_total", "Approved posts charged to quota");
    describe_counter!(
        "voxpost_quota_rejections_total",
        "Requests refused because the daily quota was used up"
    );
    describe_counter!("voxpost_webhooks_total", "Acquirer webhooks by outcome");
    describe_counter!("voxpost_renewals_total", "Recurring charge attempts by outcome");
    describe_gauge!("voxpost_active_sessions", "Sessions held in memory");
    describe_counter!(
        "voxpost_internal_errors_total",
        "Invariant violations that need operator attention"
    );
}

/// Record one finished generation attempt.
pub fn record_generation(result: &'static str, seconds: f64) {
    metrics::counter!("voxpost_generations_total", "result" => result).increment(1);
    metrics::histogram!("voxpost_generation_duration_seconds").record(seconds);
}

pub fn record_transcription(result: &'static str) {
    metrics::counter!("voxpost_transcriptions_total", "result" => result).increment(1);
}

pub fn record_quota_charge() {
    metrics::counter!("voxpost_quota_charges_total").increment(1);
}

pub fn record_quota_rejection() {
    metrics::counter!("voxpost_quota_rejections_total").increment(1);
}

pub fn record_webhook(outcome: &'static str) {
    metrics::counter!("voxpost_webhooks_total", "outcome" => outcome).increment(1);
}

pub fn record_renewal(outcome: &'static str) {
    metrics::counter!("voxpost_renewals_total", "outcome" => outcome).increment(1);
}

/// Set the number of sessions currently held in memory.
pub fn set_active_sessions(count: f64) {
    metrics::gauge!("voxpost_active_sessions").set(count);
}

pub fn record_internal_error(kind: &'static str) {
    metrics::counter!("voxpost_internal_errors_total", "kind" => kind).increment(1);
}
