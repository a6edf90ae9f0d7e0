// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock messenger adapter.
//!
//! Captures every outbound message and fakes voice downloads by writing
//! `audio:{file_handle}` to the destination path.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use voxpost_core::{
    AdapterType, EntityFormatter, FormattedText, HealthStatus, MessageId, MessengerAdapter,
    OutboundMessage, PluginAdapter, UserId, VoxpostError,
};

pub struct MockMessenger {
    sent: Mutex<Vec<OutboundMessage>>,
    failing: Mutex<HashSet<String>>,
    download_delay: Mutex<Duration>,
    next_id: AtomicU64,
}

impl MockMessenger {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            download_delay: Mutex::new(Duration::ZERO),
            next_id: AtomicU64::new(1),
        }
    }

    /// Get all messages that were sent through `send()`.
    pub async fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_to(&self, user: UserId) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|m| m.user_id == user)
            .cloned()
            .collect()
    }

    pub async fn last_text(&self, user: UserId) -> Option<String> {
        self.sent
            .lock()
            .await
            .iter()
            .rev()
            .find(|m| m.user_id == user)
            .map(|m| m.text.clone())
    }

    pub async fn clear_sent(&self) {
        self.sent.lock().await.clear();
    }

    /// Make downloads of `file_handle` fail.
    pub async fn fail_download(&self, file_handle: &str) {
        self.failing.lock().await.insert(file_handle.to_string());
    }

    pub async fn set_download_delay(&self, delay: Duration) {
        *self.download_delay.lock().await = delay;
    }
}

impl Default for MockMessenger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockMessenger {
    fn name(&self) -> &str {
        "mock-messenger"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Messenger
    }

    async fn health_check(&self) -> Result<HealthStatus, VoxpostError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), VoxpostError> {
        Ok(())
    }
}

#[async_trait]
impl MessengerAdapter for MockMessenger {
    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, VoxpostError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().await.push(msg);
        Ok(MessageId(format!("mock-msg-{id}")))
    }

    async fn download_voice(&self, file_handle: &str, dest: &Path) -> Result<(), VoxpostError> {
        let delay = *self.download_delay.lock().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().await.contains(file_handle) {
            return Err(VoxpostError::channel(format!("download of {file_handle} failed")));
        }
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| VoxpostError::Internal(e.to_string()))?;
        }
        tokio::fs::write(dest, format!("audio:{file_handle}"))
            .await
            .map_err(|e| VoxpostError::Internal(e.to_string()))
    }
}

/// Formatter that keeps the raw text and adds no entities.
pub struct PlainFormatter;

impl EntityFormatter for PlainFormatter {
    fn format(&self, raw: &str) -> FormattedText {
        FormattedText::plain(raw.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_messages_per_user() {
        let messenger = MockMessenger::new();
        messenger
            .send(OutboundMessage::text(UserId(1), "one"))
            .await
            .unwrap();
        messenger
            .send(OutboundMessage::text(UserId(2), "two"))
            .await
            .unwrap();
        assert_eq!(messenger.sent_to(UserId(1)).await.len(), 1);
        assert_eq!(messenger.last_text(UserId(2)).await.as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn downloads_write_the_handle() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("media/1_v1.oga");
        let messenger = MockMessenger::new();
        messenger.download_voice("v1", &dest).await.unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "audio:v1");

        messenger.fail_download("v2").await;
        assert!(messenger.download_voice("v2", &dest).await.is_err());
    }
}
