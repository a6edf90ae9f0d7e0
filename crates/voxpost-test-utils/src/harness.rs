// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a session engine and a subscription coordinator
//! over mock adapters and a temp SQLite database. Helpers drive the engine
//! through [`SessionEngine::dispatch`], the same entry point the messenger
//! adapter uses.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use voxpost_billing::{BillingSettings, SubscriptionCoordinator};
use voxpost_config::VoxpostConfig;
use voxpost_core::{
    Action, ContentKind, InboundEvent, InboundKind, MessageId, UserId, VoxpostError,
};
use voxpost_quota::QuotaGate;
use voxpost_session::{EngineDeps, EngineSettings, PromptStore, SessionEngine};
use voxpost_storage::Database;

use crate::mock_acquirer::MockAcquirer;
use crate::mock_llm::{MockLlm, MockReply};
use crate::mock_messenger::{MockMessenger, PlainFormatter};
use crate::mock_transcriber::MockTranscriber;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    replies: Vec<MockReply>,
    config: VoxpostConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            replies: Vec::new(),
            config: VoxpostConfig::default(),
        }
    }

    /// Queue LLM completions.
    pub fn with_llm_replies(mut self, replies: Vec<&str>) -> Self {
        self.replies
            .extend(replies.into_iter().map(|r| MockReply::Text(r.to_string())));
        self
    }

    pub fn with_free_limit(mut self, limit: u32) -> Self {
        self.config.quota.free_daily_limit = limit;
        self
    }

    pub fn with_transcription_concurrency(mut self, permits: usize) -> Self {
        self.config.transcription.max_concurrency = permits;
        self
    }

    /// Adjust any other config value.
    pub fn with_config(mut self, f: impl FnOnce(&mut VoxpostConfig)) -> Self {
        f(&mut self.config);
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, VoxpostError> {
        let temp_dir = tempfile::TempDir::new().map_err(|e| VoxpostError::Storage {
            source: Box::new(e),
        })?;
        let mut config = self.config;
        config.storage.database_path = temp_dir.path().join("test.db").to_string_lossy().into_owned();
        config.session.media_dir = temp_dir.path().join("media").to_string_lossy().into_owned();

        let db = Arc::new(Database::open(&config.storage.database_path).await?);
        let quota = QuotaGate::new(Arc::clone(&db), &config.quota);

        let transcriber = Arc::new(MockTranscriber::new());
        let llm = Arc::new(MockLlm::with_replies(self.replies));
        let acquirer = Arc::new(MockAcquirer::new());
        let messenger = Arc::new(MockMessenger::new());

        let coordinator = Arc::new(SubscriptionCoordinator::new(
            Arc::clone(&db),
            acquirer.clone(),
            BillingSettings::from_config(&config),
        ));

        let cancel = CancellationToken::new();
        let engine = Arc::new(SessionEngine::new(
            EngineDeps {
                db: Arc::clone(&db),
                quota: quota.clone(),
                billing: Arc::clone(&coordinator),
                transcriber: transcriber.clone(),
                llm: llm.clone(),
                messenger: messenger.clone(),
                formatter: Arc::new(PlainFormatter),
                prompts: PromptStore::default(),
            },
            EngineSettings::from_config(&config),
            cancel.clone(),
        ));

        Ok(TestHarness {
            engine,
            coordinator,
            db,
            quota,
            transcriber,
            llm,
            acquirer,
            messenger,
            config,
            cancel,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock adapters and temp storage.
pub struct TestHarness {
    pub engine: Arc<SessionEngine>,
    pub coordinator: Arc<SubscriptionCoordinator>,
    /// SQLite database (temp file, cleaned up on drop).
    pub db: Arc<Database>,
    pub quota: QuotaGate,
    pub transcriber: Arc<MockTranscriber>,
    pub llm: Arc<MockLlm>,
    pub acquirer: Arc<MockAcquirer>,
    pub messenger: Arc<MockMessenger>,
    pub config: VoxpostConfig,
    pub cancel: CancellationToken,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A harness with default settings.
    pub async fn new() -> Result<TestHarness, VoxpostError> {
        Self::builder().build().await
    }

    pub fn media_dir(&self) -> &Path {
        Path::new(&self.config.session.media_dir)
    }

    /// Voice files currently on disk.
    pub fn media_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.media_dir())
            .map(|entries| entries.filter_map(|e| e.ok().map(|e| e.path())).collect())
            .unwrap_or_default()
    }

    pub async fn event(&self, user: UserId, kind: InboundKind) {
        self.engine
            .dispatch(InboundEvent {
                user_id: user,
                handle: Some(format!("user{}", user.0)),
                kind,
            })
            .await;
    }

    pub async fn start(&self, user: UserId, referral: Option<&str>) {
        self.event(
            user,
            InboundKind::Start {
                referral: referral.map(str::to_string),
            },
        )
        .await;
    }

    pub async fn press(&self, user: UserId, action: Action) {
        self.event(user, InboundKind::Action(action)).await;
    }

    /// Send a voice clip. Its message id is `m-{file_handle}`.
    pub async fn voice(&self, user: UserId, file_handle: &str) {
        self.event(
            user,
            InboundKind::Voice {
                file_handle: file_handle.to_string(),
                message_id: MessageId(format!("m-{file_handle}")),
            },
        )
        .await;
    }

    /// Register, open the kind picker, pick `kind` and send `handles`.
    pub async fn dictate(&self, user: UserId, kind: ContentKind, handles: &[&str]) {
        self.start(user, None).await;
        self.press(user, Action::CreatePost).await;
        self.press(user, Action::PickKind(kind)).await;
        for handle in handles {
            self.voice(user, handle).await;
        }
    }

    /// Dictate and generate a post, leaving it pending approval.
    pub async fn generate_post(&self, user: UserId, handles: &[&str]) {
        self.dictate(user, ContentKind::TelegramPost, handles).await;
        self.press(user, Action::StartCreation).await;
    }

    pub async fn last_reply(&self, user: UserId) -> Option<String> {
        self.messenger.last_text(user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxpost_session::Step;

    #[tokio::test]
    async fn harness_runs_a_post_to_approval() {
        let harness = TestHarness::builder()
            .with_llm_replies(vec!["Hello!"])
            .build()
            .await
            .unwrap();
        harness.generate_post(UserId(1), &["v1"]).await;
        assert_eq!(harness.engine.step(UserId(1)), Step::PendingApproval);
        assert_eq!(harness.last_reply(UserId(1)).await.as_deref(), Some("Hello!"));
        assert!(harness.media_files().is_empty());
    }
}
