// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for Voxpost.
//!
//! WAL-mode SQLite with embedded migrations and a single-writer concurrency
//! model via `tokio-rusqlite`. Holds users, daily usage counters,
//! subscriptions, post history and the applied-payment ledger.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::{Database, fmt_ts};
pub use models::*;
