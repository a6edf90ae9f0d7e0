// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Voxpost integration tests.
//!
//! Provides mock adapters and a test harness for fast, deterministic,
//! CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockTranscriber`] - scripted speech-to-text with concurrency tracking
//! - [`MockLlm`] - queued completions with request capture
//! - [`MockAcquirer`] - scripted payments with request capture
//! - [`MockMessenger`] - captured replies and fake voice downloads
//! - [`TestHarness`] - engine and coordinator wired on a temp database

pub mod harness;
pub mod mock_acquirer;
pub mod mock_llm;
pub mod mock_messenger;
pub mod mock_transcriber;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_acquirer::{ChargeScript, MockAcquirer, succeeded_payment};
pub use mock_llm::{MockLlm, MockReply};
pub use mock_messenger::{MockMessenger, PlainFormatter};
pub use mock_transcriber::{MockTranscriber, MockTranscript};
