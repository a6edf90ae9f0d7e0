// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded-parallel transcription of one fragment buffer.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use voxpost_core::TranscriptionAdapter;

use crate::state::{FragmentBuffer, FragmentStatus};

/// What happened to one fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentOutcome {
    Text(String),
    Failed { transient: bool, cause: String },
}

/// A fragment as handed to the batch.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub file_handle: String,
    /// Transcript kept from an earlier attempt.
    pub cached: Option<String>,
    pub path: Option<PathBuf>,
}

impl BatchItem {
    /// Snapshot the usable fragments of a buffer, in insertion order.
    pub fn from_buffer(buffer: &FragmentBuffer) -> Vec<BatchItem> {
        buffer
            .iter()
            .filter(|r| r.status != FragmentStatus::Error)
            .map(|r| BatchItem {
                file_handle: r.file_handle.clone(),
                cached: r.text.clone().filter(|_| r.status == FragmentStatus::Completed),
                path: r.path.clone(),
            })
            .collect()
    }
}

/// Result of a batch: outcomes in input order, and whether it was cut short.
#[derive(Debug)]
pub struct BatchResult {
    pub outcomes: Vec<(String, FragmentOutcome)>,
    pub cancelled: bool,
}

impl BatchResult {
    pub fn transcripts(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter_map(|(_, o)| match o {
                FragmentOutcome::Text(t) => Some(t.clone()),
                FragmentOutcome::Failed { .. } => None,
            })
            .collect()
    }

    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, FragmentOutcome::Failed { .. }))
            .count()
    }
}

/// Transcribe every item in parallel. Outgoing calls share `permits`;
/// individual failures never stop the batch.
pub async fn transcribe_batch(
    transcriber: Arc<dyn TranscriptionAdapter>,
    permits: Arc<Semaphore>,
    items: Vec<BatchItem>,
    cancel: &CancellationToken,
) -> BatchResult {
    let initial: Vec<Option<FragmentOutcome>> = items
        .iter()
        .map(|item| match (&item.cached, &item.path) {
            (Some(text), _) => Some(FragmentOutcome::Text(text.clone())),
            (None, None) => Some(FragmentOutcome::Failed {
                transient: false,
                cause: "audio file missing".to_string(),
            }),
            (None, Some(_)) => None,
        })
        .collect();
    let slots = Arc::new(Mutex::new(initial));

    let mut set = JoinSet::new();
    for (idx, item) in items.iter().enumerate() {
        let (None, Some(path)) = (&item.cached, &item.path) else {
            continue;
        };
        let path = path.clone();
        let transcriber = Arc::clone(&transcriber);
        let permits = Arc::clone(&permits);
        let slots = Arc::clone(&slots);
        set.spawn(async move {
            let outcome = match permits.acquire_owned().await {
                Ok(_permit) => match transcriber.transcribe(&path).await {
                    Ok(text) if !text.trim().is_empty() => FragmentOutcome::Text(text),
                    Ok(_) => FragmentOutcome::Failed {
                        transient: false,
                        cause: "empty transcript".to_string(),
                    },
                    Err(e) => FragmentOutcome::Failed {
                        transient: e.is_transient(),
                        cause: e.to_string(),
                    },
                },
                Err(_) => FragmentOutcome::Failed {
                    transient: true,
                    cause: "transcription pool closed".to_string(),
                },
            };
            voxpost_prometheus::record_transcription(match outcome {
                FragmentOutcome::Text(_) => "ok",
                FragmentOutcome::Failed { .. } => "error",
            });
            slots.lock().await[idx] = Some(outcome);
        });
    }

    let cancelled = loop {
        tokio::select! {
            next = set.join_next() => match next {
                None => break false,
                Some(Err(e)) if e.is_panic() => warn!(error = %e, "transcription task panicked"),
                Some(_) => {}
            },
            _ = cancel.cancelled() => break true,
        }
    };
    if cancelled {
        set.abort_all();
        debug!("transcription batch cancelled");
    }

    let slots = std::mem::take(&mut *slots.lock().await);
    let outcomes = items
        .into_iter()
        .zip(slots)
        .map(|(item, slot)| {
            let outcome = slot.unwrap_or_else(|| FragmentOutcome::Failed {
                transient: true,
                cause: "transcription did not finish".to_string(),
            });
            (item.file_handle, outcome)
        })
        .collect();
    BatchResult { outcomes, cancelled }
}
