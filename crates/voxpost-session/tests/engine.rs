// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session engine flows driven through `dispatch` with mock adapters.

use std::sync::Arc;
use std::time::Duration;

use voxpost_core::{
    Action, ButtonTarget, ContentKind, InboundKind, MessageId, TranscriptionFailure, UserId,
};
use voxpost_session::{FragmentStatus, Step};
use voxpost_storage::queries::{posts, users};
use voxpost_test_utils::{MockReply, MockTranscript, TestHarness};

const ALICE: UserId = UserId(1001);

#[tokio::test]
async fn three_fragments_become_one_approved_post() {
    let harness = TestHarness::new().await.unwrap();
    harness.generate_post(ALICE, &["v1", "v2", "v3"]).await;

    assert_eq!(harness.engine.step(ALICE), Step::PendingApproval);
    let request = harness.llm.last_request().await.unwrap();
    assert!(request.user.contains(
        "Fragment 1: transcript of v1\n\nFragment 2: transcript of v2\n\nFragment 3: transcript of v3"
    ));
    let session = harness.engine.session(ALICE).unwrap();
    let post = session.post.unwrap();
    assert_eq!(post.source_texts.len(), 3);
    assert!(post.message_id.is_some());

    harness.press(ALICE, Action::Approve).await;
    assert_eq!(harness.engine.step(ALICE), Step::Idle);
    assert!(harness.engine.session(ALICE).is_none());

    let history = posts::list_posts(&harness.db, ALICE, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].is_saved);
    assert_eq!(history[0].fragment_count, 3);
    assert_eq!(history[0].content_kind, ContentKind::TelegramPost);

    let decision = harness.quota.check(ALICE).await.unwrap();
    let limit = harness.config.quota.free_daily_limit;
    assert_eq!(decision.remaining, Some(limit - 1));
    assert!(harness.last_reply(ALICE).await.unwrap().starts_with("Approved!"));
    assert!(harness.media_files().is_empty());
}

#[tokio::test]
async fn edit_round_trip_keeps_every_source_text() {
    let harness = TestHarness::builder()
        .with_llm_replies(vec!["First draft", "Second draft"])
        .build()
        .await
        .unwrap();
    harness.generate_post(ALICE, &["v1"]).await;
    harness.press(ALICE, Action::Edit).await;
    assert_eq!(harness.engine.step(ALICE), Step::EditingWaitingForVoice);

    harness.voice(ALICE, "e1").await;
    harness.press(ALICE, Action::ApplyEdits).await;
    assert_eq!(harness.engine.step(ALICE), Step::PendingApproval);

    let request = harness.llm.last_request().await.unwrap();
    assert!(request.user.contains("Original:\nFirst draft"));
    assert!(request.user.contains("Edits:\ntranscript of e1"));
    assert_eq!(harness.last_reply(ALICE).await.as_deref(), Some("Second draft"));

    let session = harness.engine.session(ALICE).unwrap();
    assert!(session.edits.is_empty());
    assert_eq!(
        session.post.unwrap().source_texts,
        vec!["transcript of v1".to_string(), "transcript of e1".to_string()]
    );

    harness.press(ALICE, Action::Save).await;
    let history = posts::list_posts(&harness.db, ALICE, 10).await.unwrap();
    assert_eq!(history[0].response_text, "Second draft");
    assert_eq!(
        history[0].voice_text,
        "transcript of v1\n\ntranscript of e1"
    );
    assert_eq!(harness.last_reply(ALICE).await.as_deref(), Some("Saved to your history."));
}

#[tokio::test]
async fn free_limit_blocks_the_next_post() {
    let harness = TestHarness::builder()
        .with_free_limit(1)
        .build()
        .await
        .unwrap();
    harness.generate_post(ALICE, &["v1"]).await;
    harness.press(ALICE, Action::Approve).await;

    harness.press(ALICE, Action::CreatePost).await;
    assert_eq!(harness.engine.step(ALICE), Step::Idle);
    let sent = harness.messenger.sent_to(ALICE).await;
    let last = sent.last().unwrap();
    assert!(last.text.contains("all 1 free posts"));
    let actions: Vec<Action> = last.keyboard.as_ref().unwrap().actions().collect();
    assert!(actions.contains(&Action::Subscribe));
    assert_eq!(posts::count_posts(&harness.db, ALICE, false).await.unwrap(), 1);
}

#[tokio::test]
async fn quota_is_checked_again_before_generation() {
    let harness = TestHarness::builder()
        .with_free_limit(1)
        .build()
        .await
        .unwrap();
    harness.dictate(ALICE, ContentKind::TelegramPost, &["v1"]).await;
    // Spent elsewhere between opening the picker and generating.
    harness.quota.charge(ALICE).await.unwrap();

    harness.press(ALICE, Action::StartCreation).await;
    assert_eq!(harness.engine.step(ALICE), Step::Idle);
    assert!(harness.llm.requests().await.is_empty());
    assert!(harness.media_files().is_empty());
}

#[tokio::test]
async fn second_start_while_generating_is_rejected() {
    let harness = Arc::new(TestHarness::new().await.unwrap());
    harness.llm.set_delay(Duration::from_millis(300)).await;
    harness.dictate(ALICE, ContentKind::TelegramPost, &["v1"]).await;

    let first = {
        let harness = Arc::clone(&harness);
        tokio::spawn(async move { harness.press(ALICE, Action::StartCreation).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        harness.engine.step(ALICE),
        Step::Generating(voxpost_session::BatchKind::Ingestion)
    );
    harness.press(ALICE, Action::StartCreation).await;
    assert_eq!(
        harness.last_reply(ALICE).await.as_deref(),
        Some("Your post is already being written, please wait.")
    );

    first.await.unwrap();
    assert_eq!(harness.engine.step(ALICE), Step::PendingApproval);
    assert_eq!(harness.llm.requests().await.len(), 1);
}

#[tokio::test]
async fn empty_buffer_cannot_start() {
    let harness = TestHarness::new().await.unwrap();
    harness.dictate(ALICE, ContentKind::YoutubeScript, &[]).await;
    harness.press(ALICE, Action::StartCreation).await;

    assert_eq!(harness.engine.step(ALICE), Step::WaitingForVoice);
    assert_eq!(
        harness.last_reply(ALICE).await.as_deref(),
        Some("Send at least one voice message first.")
    );
    assert!(harness.llm.requests().await.is_empty());
}

#[tokio::test]
async fn out_of_place_actions_are_refused() {
    let harness = TestHarness::new().await.unwrap();
    harness.start(ALICE, None).await;

    harness.press(ALICE, Action::Approve).await;
    let last = harness.messenger.sent_to(ALICE).await.pop().unwrap();
    assert!(last.text.starts_with("That action is not available"));
    let actions: Vec<Action> = last.keyboard.unwrap().actions().collect();
    assert!(actions.contains(&Action::CreatePost));

    harness.voice(ALICE, "stray").await;
    assert!(harness.engine.session(ALICE).is_none());
    assert!(harness.media_files().is_empty());

    harness.press(ALICE, Action::ApplyEdits).await;
    assert_eq!(harness.engine.step(ALICE), Step::Idle);
}

#[tokio::test]
async fn text_messages_get_a_hint() {
    let harness = TestHarness::new().await.unwrap();
    harness
        .event(ALICE, InboundKind::Text("hello".to_string()))
        .await;
    assert!(harness.last_reply(ALICE).await.unwrap().starts_with("Send me a voice message"));
}

#[tokio::test]
async fn repeated_file_handle_is_buffered_once() {
    let harness = TestHarness::new().await.unwrap();
    harness.dictate(ALICE, ContentKind::TelegramPost, &["v1"]).await;
    harness
        .event(
            ALICE,
            InboundKind::Voice {
                file_handle: "v1".to_string(),
                message_id: MessageId("m-second".to_string()),
            },
        )
        .await;
    harness.engine.drain_downloads().await;

    let session = harness.engine.session(ALICE).unwrap();
    assert_eq!(session.ingestion.len(), 1);
    let record = session.ingestion.get("v1").unwrap();
    assert_eq!(record.message_id, MessageId("m-second".to_string()));
    assert!(record.path.is_some());
    assert_eq!(harness.media_files().len(), 1);
}

#[tokio::test]
async fn failed_download_is_left_out_of_the_post() {
    let harness = TestHarness::new().await.unwrap();
    harness.messenger.fail_download("v2").await;
    harness.generate_post(ALICE, &["v1", "v2", "v3"]).await;

    assert_eq!(harness.engine.step(ALICE), Step::PendingApproval);
    let request = harness.llm.last_request().await.unwrap();
    assert!(request.user.contains("transcript of v1"));
    assert!(request.user.contains("transcript of v3"));
    assert!(!request.user.contains("transcript of v2"));
    assert_eq!(harness.transcriber.calls(), 2);
}

#[tokio::test]
async fn llm_outage_keeps_transcripts_for_retry() {
    let harness = TestHarness::new().await.unwrap();
    harness.llm.push(MockReply::Status(503)).await;
    harness.generate_post(ALICE, &["v1", "v2"]).await;

    assert_eq!(harness.engine.step(ALICE), Step::WaitingForVoice);
    assert_eq!(
        harness.last_reply(ALICE).await.as_deref(),
        Some("The service is temporarily unavailable. Tap Create to try again.")
    );
    let session = harness.engine.session(ALICE).unwrap();
    assert!(
        session
            .ingestion
            .iter()
            .all(|r| r.status == FragmentStatus::Completed && r.text.is_some())
    );
    assert!(harness.media_files().is_empty());

    harness.press(ALICE, Action::StartCreation).await;
    assert_eq!(harness.engine.step(ALICE), Step::PendingApproval);
    // Completed fragments are not transcribed twice.
    assert_eq!(harness.transcriber.calls(), 2);
    assert_eq!(harness.llm.requests().await.len(), 2);
}

#[tokio::test]
async fn blank_completion_is_a_failed_generation() {
    let harness = TestHarness::new().await.unwrap();
    harness.llm.push(MockReply::Empty).await;
    harness.generate_post(ALICE, &["v1"]).await;

    assert_eq!(harness.engine.step(ALICE), Step::WaitingForVoice);
    assert!(harness.last_reply(ALICE).await.unwrap().contains("I could not make a post"));
}

#[tokio::test]
async fn transcription_failures_split_by_kind() {
    let harness = TestHarness::new().await.unwrap();
    harness.transcriber.set_failure("flaky").await;
    harness
        .transcriber
        .script(
            "gone",
            MockTranscript::Fail {
                kind: TranscriptionFailure::NotFound,
                status: None,
            },
        )
        .await;
    harness.generate_post(ALICE, &["v1", "flaky", "gone"]).await;

    // The surviving fragment still makes a post.
    assert_eq!(harness.engine.step(ALICE), Step::PendingApproval);
    let request = harness.llm.last_request().await.unwrap();
    assert!(request.user.contains("Fragment 1: transcript of v1"));
    assert!(!request.user.contains("Fragment 2"));
}

#[tokio::test]
async fn all_fragments_failing_returns_to_dictation() {
    let harness = TestHarness::new().await.unwrap();
    harness.transcriber.set_failure("flaky").await;
    harness
        .transcriber
        .script(
            "gone",
            MockTranscript::Fail {
                kind: TranscriptionFailure::NotFound,
                status: None,
            },
        )
        .await;
    harness.generate_post(ALICE, &["flaky", "gone"]).await;

    assert_eq!(harness.engine.step(ALICE), Step::WaitingForVoice);
    assert!(harness.llm.requests().await.is_empty());
    let session = harness.engine.session(ALICE).unwrap();
    assert_eq!(session.ingestion.len(), 1);
    assert_eq!(
        session.ingestion.get("flaky").unwrap().status,
        FragmentStatus::Error
    );

    // Sending the clip again re-downloads it.
    harness.transcriber.set_text("flaky", "better now").await;
    harness.voice(ALICE, "flaky").await;
    harness.press(ALICE, Action::StartCreation).await;
    assert_eq!(harness.engine.step(ALICE), Step::PendingApproval);
    assert!(
        harness
            .llm
            .last_request()
            .await
            .unwrap()
            .user
            .contains("better now")
    );
}

#[tokio::test]
async fn main_menu_keeps_unsaved_post_and_clears_files() {
    let harness = TestHarness::new().await.unwrap();
    harness.generate_post(ALICE, &["v1"]).await;
    harness.press(ALICE, Action::Edit).await;
    harness.voice(ALICE, "e1").await;
    harness.engine.drain_downloads().await;
    assert_eq!(harness.media_files().len(), 1);

    harness.press(ALICE, Action::MainMenu).await;
    assert_eq!(harness.engine.step(ALICE), Step::Idle);
    assert!(harness.media_files().is_empty());

    let history = posts::list_posts(&harness.db, ALICE, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(!history[0].is_saved);
    assert_eq!(posts::count_posts(&harness.db, ALICE, true).await.unwrap(), 0);

    // Discarding never costs quota.
    let decision = harness.quota.check(ALICE).await.unwrap();
    assert_eq!(decision.remaining, Some(harness.config.quota.free_daily_limit));
}

#[tokio::test]
async fn main_menu_during_generation_discards_the_result() {
    let harness = Arc::new(TestHarness::new().await.unwrap());
    harness.llm.set_delay(Duration::from_millis(300)).await;
    harness.dictate(ALICE, ContentKind::TelegramPost, &["v1"]).await;

    let generating = {
        let harness = Arc::clone(&harness);
        tokio::spawn(async move { harness.press(ALICE, Action::StartCreation).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    harness.press(ALICE, Action::MainMenu).await;
    generating.await.unwrap();

    assert_eq!(harness.engine.step(ALICE), Step::Idle);
    assert_eq!(harness.last_reply(ALICE).await.as_deref(), Some("Main menu."));
    assert_eq!(posts::count_posts(&harness.db, ALICE, false).await.unwrap(), 0);
}

#[tokio::test]
async fn abandoned_generation_cannot_overwrite_a_newer_batch() {
    let harness = Arc::new(TestHarness::new().await.unwrap());
    harness.llm.set_delay(Duration::from_millis(400)).await;
    harness.dictate(ALICE, ContentKind::TelegramPost, &["old"]).await;

    let first = {
        let harness = Arc::clone(&harness);
        tokio::spawn(async move { harness.press(ALICE, Action::StartCreation).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    harness.press(ALICE, Action::MainMenu).await;

    // Back in Generating(Ingestion) before the first run returns.
    harness.dictate(ALICE, ContentKind::TelegramPost, &["new"]).await;
    let second = {
        let harness = Arc::clone(&harness);
        tokio::spawn(async move { harness.press(ALICE, Action::StartCreation).await })
    };
    first.await.unwrap();
    second.await.unwrap();

    assert_eq!(harness.engine.step(ALICE), Step::PendingApproval);
    let post = harness.engine.session(ALICE).unwrap().post.unwrap();
    assert_eq!(post.source_texts, vec!["transcript of new".to_string()]);
    assert_eq!(harness.engine.session(ALICE).unwrap().generation, 0);
}

#[tokio::test]
async fn formatting_preferences_reach_the_prompt() {
    let harness = TestHarness::new().await.unwrap();
    harness.start(ALICE, None).await;
    harness.press(ALICE, Action::CreatePost).await;
    harness.press(ALICE, Action::ToggleEmoji).await;
    harness.press(ALICE, Action::PickKind(ContentKind::InstagramPost)).await;
    harness.voice(ALICE, "v1").await;
    harness.press(ALICE, Action::StartCreation).await;

    let request = harness.llm.last_request().await.unwrap();
    assert!(request.system.contains("Do not use emoji."));
    assert!(request.system.contains("End with two to four relevant hashtags."));

    // Preferences outlive the post.
    harness.press(ALICE, Action::Approve).await;
    harness.press(ALICE, Action::CreatePost).await;
    assert!(!harness.engine.session(ALICE).unwrap().prefs.emoji);
}

#[tokio::test]
async fn start_records_a_referral_once() {
    let harness = TestHarness::new().await.unwrap();
    let referrer = UserId(1);
    harness.start(referrer, None).await;
    let code = users::get_user(&harness.db, referrer)
        .await
        .unwrap()
        .unwrap()
        .referral_code
        .unwrap();
    assert!(harness.last_reply(referrer).await.unwrap().contains(&code));

    harness.start(UserId(2), Some(&code)).await;
    let invited = users::get_user(&harness.db, UserId(2)).await.unwrap().unwrap();
    assert_eq!(invited.referred_by, Some(referrer));

    // A returning user cannot be re-attributed.
    harness.start(UserId(3), None).await;
    let other = users::get_user(&harness.db, UserId(3))
        .await
        .unwrap()
        .unwrap()
        .referral_code
        .unwrap();
    harness.start(UserId(2), Some(&other)).await;
    let invited = users::get_user(&harness.db, UserId(2)).await.unwrap().unwrap();
    assert_eq!(invited.referred_by, Some(referrer));
}

#[tokio::test]
async fn subscribe_sends_a_payment_link() {
    let harness = TestHarness::new().await.unwrap();
    harness.start(ALICE, None).await;
    harness.press(ALICE, Action::Subscribe).await;

    let last = harness.messenger.sent_to(ALICE).await.pop().unwrap();
    let keyboard = last.keyboard.unwrap();
    let ButtonTarget::Url(url) = &keyboard.rows[0][0].target else {
        panic!("expected a URL button");
    };
    assert!(url.starts_with("https://pay.example/confirm/"));
    assert_eq!(harness.acquirer.initial_requests().await.len(), 1);
}

#[tokio::test]
async fn status_and_cancel_reflect_the_subscription() {
    let harness = TestHarness::new().await.unwrap();
    harness.start(ALICE, None).await;

    harness.press(ALICE, Action::Status).await;
    let limit = harness.config.quota.free_daily_limit;
    assert_eq!(
        harness.last_reply(ALICE).await.unwrap(),
        format!("Tariff: free. Posts left today: {limit}.")
    );
    harness.press(ALICE, Action::CancelSubscription).await;
    assert_eq!(
        harness.last_reply(ALICE).await.as_deref(),
        Some("You have no active subscription.")
    );

    harness
        .coordinator
        .activate_from_webhook(ALICE, "cust_1", "pm_1", "p_1", 99_000)
        .await
        .unwrap();
    harness.press(ALICE, Action::Status).await;
    let last = harness.messenger.sent_to(ALICE).await.pop().unwrap();
    assert!(last.text.starts_with("Tariff: paid. Unlimited posts."));
    assert!(last.text.contains("Next payment:"));
    let actions: Vec<Action> = last.keyboard.unwrap().actions().collect();
    assert!(actions.contains(&Action::CancelSubscription));

    harness.press(ALICE, Action::CancelSubscription).await;
    assert!(harness.coordinator.current(ALICE).await.unwrap().is_none());
}
