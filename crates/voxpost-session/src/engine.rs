// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The session engine: one conversational state machine per user.
//!
//! Handlers for the same user are serialized by a striped lock. Transcription
//! and generation run with the session marked [`Step::Generating`] and the
//! lock released; the result is committed after re-acquiring it.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use voxpost_billing::SubscriptionCoordinator;
use voxpost_config::VoxpostConfig;
use voxpost_core::{
    Action, Button, CompletionRequest, ContentKind, EntityFormatter, InboundEvent, InboundKind,
    Keyboard, LlmAdapter, MessageId, MessengerAdapter, OutboundMessage, Tariff,
    TranscriptionAdapter, UserId, VoxpostError,
};
use voxpost_quota::QuotaGate;
use voxpost_storage::queries::{posts, users};
use voxpost_storage::{Database, NewPost};

use crate::error::{EngineError, ErrorClass};
use crate::locks::StripedLocks;
use crate::pipeline::{BatchItem, BatchResult, FragmentOutcome, transcribe_batch};
use crate::prompts::{PromptStore, concatenate, edit_prompt, generation_prompt};
use crate::replies;
use crate::state::{ApprovalStatus, BatchKind, FragmentStatus, Post, Session, Step};

/// Engine knobs, taken from the `session`, `transcription`, `llm`,
/// `prompts` and `acquirer` config sections.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub media_dir: PathBuf,
    pub download_timeout: Duration,
    pub transcription_concurrency: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    pub edit_from_file: bool,
    pub subscription_amount_minor: i64,
}

impl EngineSettings {
    pub fn from_config(config: &VoxpostConfig) -> Self {
        Self {
            media_dir: PathBuf::from(&config.session.media_dir),
            download_timeout: Duration::from_secs(config.session.download_timeout_secs),
            transcription_concurrency: config.transcription.max_concurrency.max(1),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            edit_from_file: config.prompts.edit_from_file,
            subscription_amount_minor: config.acquirer.subscription_amount_minor,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&VoxpostConfig::default())
    }
}

/// Collaborators the engine talks to.
pub struct EngineDeps {
    pub db: Arc<Database>,
    pub quota: QuotaGate,
    pub billing: Arc<SubscriptionCoordinator>,
    pub transcriber: Arc<dyn TranscriptionAdapter>,
    pub llm: Arc<dyn LlmAdapter>,
    pub messenger: Arc<dyn MessengerAdapter>,
    pub formatter: Arc<dyn EntityFormatter>,
    pub prompts: PromptStore,
}

/// Emoji or hashtag preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormattingToggle {
    Emoji,
    Hashtags,
}

/// What a generation captured from the session before releasing the lock.
struct GenerationJob {
    id: u64,
    kind: ContentKind,
    items: Vec<BatchItem>,
    prefs: String,
    last_generated: Option<String>,
}

pub struct SessionEngine {
    db: Arc<Database>,
    quota: QuotaGate,
    billing: Arc<SubscriptionCoordinator>,
    transcriber: Arc<dyn TranscriptionAdapter>,
    llm: Arc<dyn LlmAdapter>,
    messenger: Arc<dyn MessengerAdapter>,
    formatter: Arc<dyn EntityFormatter>,
    prompts: PromptStore,
    settings: EngineSettings,
    sessions: DashMap<UserId, Session>,
    locks: StripedLocks,
    downloads: DashMap<UserId, Vec<JoinHandle<()>>>,
    permits: Arc<Semaphore>,
    /// Generation ids, unique for the life of the process.
    generations: AtomicU64,
    cancel: CancellationToken,
}

impl SessionEngine {
    pub fn new(deps: EngineDeps, settings: EngineSettings, cancel: CancellationToken) -> Self {
        let permits = Arc::new(Semaphore::new(settings.transcription_concurrency));
        Self {
            db: deps.db,
            quota: deps.quota,
            billing: deps.billing,
            transcriber: deps.transcriber,
            llm: deps.llm,
            messenger: deps.messenger,
            formatter: deps.formatter,
            prompts: deps.prompts,
            settings,
            sessions: DashMap::new(),
            locks: StripedLocks::new(),
            downloads: DashMap::new(),
            permits,
            generations: AtomicU64::new(1),
            cancel,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// A copy of the user's session, if one is in memory.
    pub fn session(&self, user: UserId) -> Option<Session> {
        self.sessions.get(&user).map(|s| s.clone())
    }

    pub fn step(&self, user: UserId) -> Step {
        self.sessions.get(&user).map(|s| s.step).unwrap_or_default()
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Wait for every in-flight voice download to finish.
    pub async fn drain_downloads(&self) {
        let users: Vec<UserId> = self.downloads.iter().map(|e| *e.key()).collect();
        for user in users {
            self.await_downloads(user).await;
        }
    }

    /// Mutate the user's session. Sessions left blank are dropped from the map.
    fn with_session<T>(&self, user: UserId, f: impl FnOnce(&mut Session) -> T) -> T {
        let out = {
            let mut entry = self.sessions.entry(user).or_default();
            f(&mut entry)
        };
        self.sessions.remove_if(&user, |_, s| s.is_blank());
        voxpost_prometheus::set_active_sessions(self.sessions.len() as f64);
        out
    }

    async fn cancellable<T, E>(&self, fut: impl Future<Output = Result<T, E>>) -> Result<T, E>
    where
        E: From<VoxpostError>,
    {
        tokio::select! {
            result = fut => result,
            _ = self.cancel.cancelled() => Err(VoxpostError::Cancelled.into()),
        }
    }

    /// Send a message. Delivery failures are logged, never propagated.
    async fn reply(&self, msg: OutboundMessage) -> Option<MessageId> {
        let user = msg.user_id;
        match self.messenger.send(msg).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(user_id = %user, error = %e, "failed to deliver reply");
                None
            }
        }
    }

    async fn say(&self, user: UserId, text: impl Into<String>, keyboard: Option<Keyboard>) {
        let mut msg = OutboundMessage::text(user, text);
        if let Some(keyboard) = keyboard {
            msg = msg.with_keyboard(keyboard);
        }
        self.reply(msg).await;
    }

    fn quota_exceeded(&self) -> EngineError {
        EngineError::QuotaExceeded {
            limit: self.quota.ceiling(Tariff::Free).unwrap_or(0),
        }
    }

    // --- dispatch -------------------------------------------------------

    /// Route one inbound event. Errors become user replies; panics are
    /// contained here and never escape the per-user lock.
    pub async fn dispatch(self: &Arc<Self>, event: InboundEvent) {
        let user = event.user_id;
        let op = op_name(&event.kind);
        let generating_op = matches!(
            event.kind,
            InboundKind::Action(Action::StartCreation | Action::ApplyEdits)
        );
        let step = self.step(user);

        match AssertUnwindSafe(self.handle(event)).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => self.report(user, &op, &err).await,
            Err(panic) => {
                let message = panic_message(&*panic);
                error!(user_id = %user, state = %step, op, panic = %message, "session handler panicked");
                voxpost_prometheus::record_internal_error("panic");
                if generating_op {
                    self.with_session(user, |s| {
                        if let Step::Generating(batch) = s.step {
                            s.step = Step::waiting_for(batch);
                        }
                    });
                }
                self.report(user, &op, &EngineError::Internal(message)).await;
            }
        }
    }

    async fn handle(self: &Arc<Self>, event: InboundEvent) -> Result<(), EngineError> {
        let user = event.user_id;
        if let InboundKind::Start { referral } = &event.kind {
            return self
                .on_start(user, event.handle.as_deref(), referral.as_deref())
                .await;
        }
        users::ensure_user(&self.db, user, event.handle.as_deref()).await?;

        match event.kind {
            InboundKind::Start { .. } => Ok(()),
            InboundKind::Voice {
                file_handle,
                message_id,
            } => self.on_voice(user, &file_handle, message_id).await,
            InboundKind::Text(_) => self.on_text(user).await,
            InboundKind::Action(action) => match action {
                Action::CreatePost => self.on_create_post(user).await,
                Action::PickKind(kind) => self.on_pick_kind(user, kind).await,
                Action::StartCreation => self.on_start_creation(user).await,
                Action::Approve => self.on_approve(user).await,
                Action::Edit => self.on_edit(user).await,
                Action::ApplyEdits => self.on_apply_edits(user).await,
                Action::Save => self.on_save(user).await,
                Action::MainMenu => self.on_main_menu(user).await,
                Action::Status => self.on_status(user).await,
                Action::Subscribe => self.on_subscribe(user).await,
                Action::CancelSubscription => self.on_cancel_subscription(user).await,
                Action::ToggleEmoji => self.on_set_formatting(user, FormattingToggle::Emoji).await,
                Action::ToggleHashtags => {
                    self.on_set_formatting(user, FormattingToggle::Hashtags).await
                }
            },
        }
    }

    async fn report(&self, user: UserId, op: &str, err: &EngineError) {
        match err.class() {
            ErrorClass::UserInput | ErrorClass::QuotaExceeded => {
                debug!(user_id = %user, op, error = %err, "request rejected")
            }
            ErrorClass::UpstreamTransient => {
                warn!(user_id = %user, op, error = %err, "upstream unavailable")
            }
            ErrorClass::UpstreamPermanent | ErrorClass::Internal => {
                error!(user_id = %user, op, error = %err, "handler failed")
            }
            ErrorClass::Cancelled => debug!(user_id = %user, op, "handler cancelled"),
        }
        if let Some(text) = replies::for_error(err) {
            self.say(user, text, replies::error_keyboard(err)).await;
        }
    }

    // --- registration and menus -----------------------------------------

    /// Register the user, record a referral on first contact, greet.
    pub async fn on_start(
        &self,
        user: UserId,
        handle: Option<&str>,
        referral: Option<&str>,
    ) -> Result<(), EngineError> {
        let _guard = self.locks.lock(user).await;
        let (record, created) = users::ensure_user(&self.db, user, handle).await?;
        if created {
            info!(user_id = %user, "user registered");
            if let Some(code) = referral
                && let Some(referrer) = users::find_by_referral_code(&self.db, code).await?
                && users::set_referred_by(&self.db, user, referrer).await?
            {
                info!(user_id = %user, referrer = %referrer, "referral recorded");
            }
        }
        self.say(
            user,
            replies::welcome(record.referral_code.as_deref()),
            Some(replies::main_menu()),
        )
        .await;
        Ok(())
    }

    pub async fn on_text(&self, user: UserId) -> Result<(), EngineError> {
        self.say(user, replies::USE_VOICE, None).await;
        Ok(())
    }

    pub async fn on_create_post(&self, user: UserId) -> Result<(), EngineError> {
        let _guard = self.locks.lock(user).await;
        let step = self.step(user);
        if !matches!(step, Step::Idle | Step::SelectingContentType) {
            return Err(EngineError::InvalidTransition {
                step,
                action: "create_post",
            });
        }
        let decision = self.quota.check(user).await?;
        if !decision.allowed {
            return Err(self.quota_exceeded());
        }
        let prefs = self.with_session(user, |s| {
            s.step = Step::SelectingContentType;
            s.prefs
        });
        self.say(user, replies::PICK_KIND, Some(replies::kind_picker(prefs)))
            .await;
        Ok(())
    }

    pub async fn on_pick_kind(&self, user: UserId, kind: ContentKind) -> Result<(), EngineError> {
        let _guard = self.locks.lock(user).await;
        self.with_session(user, |s| {
            if s.step != Step::SelectingContentType {
                return Err(EngineError::InvalidTransition {
                    step: s.step,
                    action: "pick_kind",
                });
            }
            s.kind = Some(kind);
            s.step = Step::WaitingForVoice;
            Ok(())
        })?;
        self.say(user, replies::kind_selected(kind), Some(replies::dictation()))
            .await;
        Ok(())
    }

    pub async fn on_set_formatting(
        &self,
        user: UserId,
        toggle: FormattingToggle,
    ) -> Result<(), EngineError> {
        let _guard = self.locks.lock(user).await;
        let (prefs, step) = self.with_session(user, |s| {
            match toggle {
                FormattingToggle::Emoji => s.prefs.emoji = !s.prefs.emoji,
                FormattingToggle::Hashtags => s.prefs.hashtags = !s.prefs.hashtags,
            }
            (s.prefs, s.step)
        });
        let keyboard = (step == Step::SelectingContentType).then(|| replies::kind_picker(prefs));
        self.say(user, replies::formatting(prefs), keyboard).await;
        Ok(())
    }

    /// Discard the session. A pending post is kept in history as unsaved.
    pub async fn on_main_menu(&self, user: UserId) -> Result<(), EngineError> {
        let _guard = self.locks.lock(user).await;
        let (post, files) = self.with_session(user, |s| {
            let post = s.post.take();
            let files = s.drain_all_files();
            *s = Session::fresh(s.prefs);
            (post, files)
        });
        remove_files(&files).await;

        if let Some(post) = post
            && let Err(e) = posts::insert_post(&self.db, history_row(user, &post, false)).await
        {
            warn!(user_id = %user, error = %e, "could not keep unsaved post");
        }
        self.say(user, replies::MAIN_MENU, Some(replies::main_menu()))
            .await;
        Ok(())
    }

    // --- dictation ------------------------------------------------------

    /// Buffer a voice clip and start downloading it.
    pub async fn on_voice(
        self: &Arc<Self>,
        user: UserId,
        file_handle: &str,
        message_id: MessageId,
    ) -> Result<(), EngineError> {
        let _guard = self.locks.lock(user).await;
        let (batch, download, count) = self.with_session(user, |s| {
            let Some(batch) = s.active_batch() else {
                return Err(EngineError::InvalidTransition {
                    step: s.step,
                    action: "voice",
                });
            };
            let buffer = s.buffer_mut(batch);
            let is_new = buffer.upsert(file_handle, message_id);
            let mut download = is_new;
            if !is_new
                && let Some(record) = buffer.get_mut(file_handle)
                && record.status == FragmentStatus::Error
            {
                record.status = FragmentStatus::Pending;
                record.error = None;
                record.downloading = true;
                download = true;
            }
            Ok((batch, download, buffer.len()))
        })?;

        if download {
            self.spawn_download(user, file_handle.to_string());
        }
        debug!(user_id = %user, file_handle, fragments = count, "voice fragment buffered");
        let keyboard = match batch {
            BatchKind::Ingestion => replies::dictation(),
            BatchKind::Edit => replies::editing(),
        };
        self.say(user, replies::fragment_accepted(count), Some(keyboard))
            .await;
        Ok(())
    }

    fn spawn_download(self: &Arc<Self>, user: UserId, file_handle: String) {
        let dest = self
            .settings
            .media_dir
            .join(media_file_name(user, &file_handle));
        let engine = Arc::clone(self);
        let task = tokio::spawn(async move { engine.download(user, file_handle, dest).await });
        let mut pending = self.downloads.entry(user).or_default();
        pending.retain(|t| !t.is_finished());
        pending.push(task);
    }

    async fn download(&self, user: UserId, file_handle: String, dest: PathBuf) {
        let timeout = self.settings.download_timeout;
        let fetched = match tokio::time::timeout(
            timeout,
            self.messenger.download_voice(&file_handle, &dest),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("download timed out after {}s", timeout.as_secs())),
        };

        let _guard = self.locks.lock(user).await;
        let kept = self.with_session(user, |s| {
            let record = match s.ingestion.get_mut(&file_handle) {
                Some(r) => Some(r),
                None => s.edits.get_mut(&file_handle),
            };
            let Some(record) = record.filter(|r| r.downloading) else {
                return false;
            };
            record.downloading = false;
            match &fetched {
                Ok(()) => {
                    record.path = Some(dest.clone());
                    true
                }
                Err(cause) => {
                    record.status = FragmentStatus::Error;
                    record.error = Some(cause.clone());
                    false
                }
            }
        });
        if let Err(cause) = &fetched {
            warn!(user_id = %user, file_handle, error = %cause, "voice download failed");
        }
        if !kept {
            remove_files(&[dest]).await;
        }
    }

    async fn await_downloads(&self, user: UserId) {
        let Some((_, pending)) = self.downloads.remove(&user) else {
            return;
        };
        for task in pending {
            if let Err(e) = task.await
                && e.is_panic()
            {
                error!(user_id = %user, error = %e, "voice download task panicked");
            }
        }
    }

    // --- generation -----------------------------------------------------

    pub async fn on_start_creation(&self, user: UserId) -> Result<(), EngineError> {
        self.generate(user, BatchKind::Ingestion).await
    }

    pub async fn on_apply_edits(&self, user: UserId) -> Result<(), EngineError> {
        self.generate(user, BatchKind::Edit).await
    }

    async fn generate(&self, user: UserId, batch: BatchKind) -> Result<(), EngineError> {
        if matches!(self.step(user), Step::Generating(_)) {
            return Err(EngineError::AlreadyGenerating);
        }
        self.await_downloads(user).await;

        let job = {
            let _guard = self.locks.lock(user).await;
            self.check_ready(user, batch)?;
            if batch == BatchKind::Ingestion {
                let decision = self.quota.check(user).await?;
                if !decision.allowed {
                    let files = self.with_session(user, |s| {
                        let files = s.drain_all_files();
                        *s = Session::fresh(s.prefs);
                        files
                    });
                    remove_files(&files).await;
                    return Err(self.quota_exceeded());
                }
            }
            let id = self.generations.fetch_add(1, Ordering::Relaxed);
            self.with_session(user, |s| {
                s.step = Step::Generating(batch);
                s.generation = id;
                GenerationJob {
                    id,
                    kind: s.kind.unwrap_or(ContentKind::TelegramPost),
                    items: BatchItem::from_buffer(s.buffer(batch)),
                    prefs: s.prefs.instructions(),
                    last_generated: s.last_generated.clone(),
                }
            })
        };
        self.say(user, replies::GENERATING, None).await;

        let started = Instant::now();
        let result = transcribe_batch(
            Arc::clone(&self.transcriber),
            Arc::clone(&self.permits),
            job.items.clone(),
            &self.cancel,
        )
        .await;
        let transcription_ms = started.elapsed().as_millis() as i64;
        let consumed: Vec<PathBuf> = job.items.iter().filter_map(|i| i.path.clone()).collect();
        remove_files(&consumed).await;

        if result.failures() > 0 {
            warn!(
                user_id = %user,
                failed = result.failures(),
                total = result.outcomes.len(),
                "fragments dropped from batch"
            );
        }
        if result.cancelled {
            self.abandon(user, batch, job.id, &result).await;
            return Err(EngineError::Cancelled);
        }
        let transcripts = result.transcripts();
        if transcripts.is_empty() {
            self.abandon(user, batch, job.id, &result).await;
            voxpost_prometheus::record_generation("failed", started.elapsed().as_secs_f64());
            return Err(EngineError::GenerationFailed(
                "no fragment could be transcribed".to_string(),
            ));
        }

        let template = self.prompts.template(job.kind);
        let (system, prompt) = match batch {
            BatchKind::Ingestion => generation_prompt(template, &job.prefs, &concatenate(&transcripts)),
            BatchKind::Edit => edit_prompt(
                template,
                &job.prefs,
                job.last_generated.as_deref().unwrap_or_default(),
                &transcripts.join("\n\n"),
                self.settings.edit_from_file,
            ),
        };
        let request = CompletionRequest {
            system,
            user: prompt,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        let generation_started = Instant::now();
        let completion = self
            .cancellable(self.llm.complete(request))
            .await
            .and_then(|raw| {
                if raw.trim().is_empty() {
                    Err(VoxpostError::EmptyCompletion)
                } else {
                    Ok(raw)
                }
            });
        let generation_ms = generation_started.elapsed().as_millis() as i64;
        let raw = match completion {
            Ok(raw) => raw,
            Err(e) => {
                self.abandon(user, batch, job.id, &result).await;
                let err = EngineError::from(e);
                voxpost_prometheus::record_generation(
                    generation_label(&err),
                    started.elapsed().as_secs_f64(),
                );
                return Err(err);
            }
        };
        let formatted = self.formatter.format(&raw);

        let _guard = self.locks.lock(user).await;
        let committed = self.with_session(user, |s| {
            if s.step != Step::Generating(batch) || s.generation != job.id {
                return false;
            }
            s.generation = 0;
            *s.buffer_mut(batch) = Default::default();
            let mut source_texts = match batch {
                BatchKind::Ingestion => Vec::new(),
                BatchKind::Edit => s.post.take().map(|p| p.source_texts).unwrap_or_default(),
            };
            source_texts.extend(transcripts.iter().cloned());
            s.post = Some(Post {
                kind: job.kind,
                text: formatted.text.clone(),
                entities: formatted.entities.clone(),
                source_texts,
                message_id: None,
                transcription_ms,
                generation_ms,
            });
            s.last_generated = Some(raw.clone());
            s.step = Step::PendingApproval;
            s.approval = ApprovalStatus::Pending;
            true
        });
        if !committed {
            debug!(user_id = %user, "session moved on during generation, result discarded");
            return Ok(());
        }
        voxpost_prometheus::record_generation("ok", started.elapsed().as_secs_f64());
        info!(
            user_id = %user,
            kind = %job.kind,
            fragments = transcripts.len(),
            transcription_ms,
            generation_ms,
            edit = batch == BatchKind::Edit,
            "post generated"
        );

        let sent = self
            .reply(
                OutboundMessage::text(user, formatted.text)
                    .with_entities(formatted.entities)
                    .with_keyboard(replies::review()),
            )
            .await;
        if let Some(id) = sent {
            self.with_session(user, |s| {
                if let Some(post) = s.post.as_mut() {
                    post.message_id = Some(id);
                }
            });
        }
        Ok(())
    }

    /// Preconditions for consuming a buffer. Caller holds the user's lock.
    fn check_ready(&self, user: UserId, batch: BatchKind) -> Result<(), EngineError> {
        let action = match batch {
            BatchKind::Ingestion => "start_creation",
            BatchKind::Edit => "apply_edits",
        };
        self.with_session(user, |s| {
            match s.step {
                Step::Generating(_) => return Err(EngineError::AlreadyGenerating),
                step if step != Step::waiting_for(batch) => {
                    return Err(EngineError::InvalidTransition { step, action });
                }
                _ => {}
            }
            let buffer = s.buffer(batch);
            if buffer.is_empty() {
                return Err(EngineError::EmptyBuffer);
            }
            if buffer
                .iter()
                .any(|r| r.status == FragmentStatus::Pending && !r.is_ready())
            {
                return Err(EngineError::FragmentNotReady);
            }
            Ok(())
        })
    }

    /// Return a failed batch to its waiting step, keeping finished transcripts.
    async fn abandon(&self, user: UserId, batch: BatchKind, id: u64, result: &BatchResult) {
        let _guard = self.locks.lock(user).await;
        self.with_session(user, |s| {
            if s.step != Step::Generating(batch) || s.generation != id {
                return;
            }
            s.generation = 0;
            let buffer = s.buffer_mut(batch);
            for (handle, outcome) in &result.outcomes {
                match outcome {
                    FragmentOutcome::Text(text) => {
                        if let Some(record) = buffer.get_mut(handle) {
                            record.status = FragmentStatus::Completed;
                            record.text = Some(text.clone());
                            record.path = None;
                        }
                    }
                    FragmentOutcome::Failed {
                        transient: true,
                        cause,
                    } => {
                        if let Some(record) = buffer.get_mut(handle) {
                            record.status = FragmentStatus::Error;
                            record.error = Some(cause.clone());
                            record.path = None;
                        }
                    }
                    FragmentOutcome::Failed {
                        transient: false, ..
                    } => {
                        buffer.remove(handle);
                    }
                }
            }
            s.step = Step::waiting_for(batch);
        });
    }

    // --- review ---------------------------------------------------------

    pub async fn on_approve(&self, user: UserId) -> Result<(), EngineError> {
        self.accept(user, false).await
    }

    pub async fn on_save(&self, user: UserId) -> Result<(), EngineError> {
        self.accept(user, true).await
    }

    /// Persist the pending post, charge one unit of quota, reset the session.
    async fn accept(&self, user: UserId, save: bool) -> Result<(), EngineError> {
        let action = if save { "save" } else { "approve" };
        let _guard = self.locks.lock(user).await;
        let post = self.with_session(user, |s| {
            if s.step != Step::PendingApproval {
                return Err(EngineError::InvalidTransition {
                    step: s.step,
                    action,
                });
            }
            s.post
                .clone()
                .ok_or_else(|| EngineError::Internal("pending approval without a post".to_string()))
        })?;

        let post_id = posts::insert_post(&self.db, history_row(user, &post, true)).await?;
        self.charge_quota(user).await;

        let files = self.with_session(user, |s| {
            s.approval = ApprovalStatus::Approved;
            let files = s.drain_all_files();
            *s = Session::fresh(s.prefs);
            files
        });
        remove_files(&files).await;
        info!(user_id = %user, post_id, kind = %post.kind, saved = save, "post accepted");

        let text = if save {
            replies::SAVED.to_string()
        } else {
            let remaining = self.quota.check(user).await.ok().and_then(|d| d.remaining);
            replies::approved(remaining)
        };
        self.say(user, text, Some(replies::main_menu())).await;
        Ok(())
    }

    /// Charge quota for an accepted post. A failure never blocks delivery:
    /// it is reported and retried once in the background.
    async fn charge_quota(&self, user: UserId) {
        let Err(e) = self.quota.charge(user).await else {
            return;
        };
        error!(user_id = %user, error = %e, "quota charge failed for accepted post, retrying");
        voxpost_prometheus::record_internal_error("quota_charge");
        let quota = self.quota.clone();
        tokio::spawn(async move {
            if let Err(e) = quota.charge(user).await {
                error!(user_id = %user, error = %e, "quota charge retry failed");
            }
        });
    }

    pub async fn on_edit(&self, user: UserId) -> Result<(), EngineError> {
        let _guard = self.locks.lock(user).await;
        let files = self.with_session(user, |s| {
            if s.step != Step::PendingApproval {
                return Err(EngineError::InvalidTransition {
                    step: s.step,
                    action: "edit",
                });
            }
            let files = s.edits.drain_files();
            s.step = Step::EditingWaitingForVoice;
            s.approval = ApprovalStatus::Editing;
            Ok(files)
        })?;
        remove_files(&files).await;
        self.say(user, replies::EDIT_PROMPT, Some(replies::editing()))
            .await;
        Ok(())
    }

    // --- account --------------------------------------------------------

    pub async fn on_status(&self, user: UserId) -> Result<(), EngineError> {
        let _guard = self.locks.lock(user).await;
        let decision = self.quota.check(user).await?;
        let subscription = self.cancellable(self.billing.current(user)).await?;
        let next_payment = subscription
            .as_ref()
            .filter(|s| s.active)
            .and_then(|s| s.next_payment);
        let keyboard = if subscription.as_ref().is_some_and(|s| s.active) {
            Keyboard::new(vec![vec![
                Button::action("Cancel subscription", Action::CancelSubscription),
                Button::action("Main menu", Action::MainMenu),
            ]])
        } else {
            replies::upsell()
        };
        self.say(
            user,
            replies::status(decision.tariff, decision.remaining, next_payment),
            Some(keyboard),
        )
        .await;
        Ok(())
    }

    pub async fn on_subscribe(&self, user: UserId) -> Result<(), EngineError> {
        let _guard = self.locks.lock(user).await;
        let initiated = self
            .cancellable(self.billing.initiate(
                user,
                Tariff::Paid,
                self.settings.subscription_amount_minor,
            ))
            .await?;
        self.say(
            user,
            replies::payment_link(),
            Some(Keyboard::new(vec![vec![Button::url(
                "Pay",
                initiated.confirmation_url,
            )]])),
        )
        .await;
        Ok(())
    }

    pub async fn on_cancel_subscription(&self, user: UserId) -> Result<(), EngineError> {
        let _guard = self.locks.lock(user).await;
        let text = match self.cancellable(self.billing.cancel(user)).await? {
            Some(_) => replies::CANCELLED_SUBSCRIPTION,
            None => replies::NO_SUBSCRIPTION,
        };
        self.say(user, text, Some(replies::main_menu())).await;
        Ok(())
    }
}

fn history_row(user: UserId, post: &Post, saved: bool) -> NewPost {
    NewPost {
        user_id: user,
        content_kind: post.kind,
        voice_text: post.source_texts.join("\n\n"),
        response_text: post.text.clone(),
        is_saved: saved,
        transcription_ms: Some(post.transcription_ms),
        generation_ms: Some(post.generation_ms),
        fragment_count: post.source_texts.len() as i64,
    }
}

/// `{user}_{handle}.oga`, with anything outside `[A-Za-z0-9_-]` replaced.
pub fn media_file_name(user: UserId, file_handle: &str) -> String {
    let safe: String = file_handle
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{user}_{safe}.oga")
}

async fn remove_files(paths: &[PathBuf]) {
    for path in paths {
        remove_file(path).await;
    }
}

async fn remove_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to delete voice file"),
    }
}

fn op_name(kind: &InboundKind) -> String {
    match kind {
        InboundKind::Start { .. } => "start".to_string(),
        InboundKind::Voice { .. } => "voice".to_string(),
        InboundKind::Text(_) => "text".to_string(),
        InboundKind::Action(action) => action.to_string(),
    }
}

fn generation_label(err: &EngineError) -> &'static str {
    match err.class() {
        ErrorClass::Cancelled => "cancelled",
        ErrorClass::UpstreamTransient => "unavailable",
        _ => "failed",
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_names_are_safe_and_distinct() {
        assert_eq!(media_file_name(UserId(42), "v1"), "42_v1.oga");
        assert_eq!(
            media_file_name(UserId(42), "AgAD/../x"),
            "42_AgAD____x.oga"
        );
        assert_ne!(
            media_file_name(UserId(1), "v1"),
            media_file_name(UserId(2), "v1")
        );
    }

    #[test]
    fn op_names_follow_callback_data() {
        assert_eq!(op_name(&InboundKind::Action(Action::ApplyEdits)), "apply_edits");
        assert_eq!(op_name(&InboundKind::Text("hi".into())), "text");
    }

    #[test]
    fn panic_payloads_are_readable() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*boxed), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*boxed), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(&*boxed), "unknown panic");
    }

    #[test]
    fn settings_follow_config() {
        let mut config = VoxpostConfig::default();
        config.transcription.max_concurrency = 0;
        config.prompts.edit_from_file = true;
        let settings = EngineSettings::from_config(&config);
        assert_eq!(settings.transcription_concurrency, 1);
        assert!(settings.edit_from_file);
    }
}
