// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Daily usage counters.
//!
//! One row per (user, calendar date); a new date starts from zero without
//! any reset job.

use chrono::NaiveDate;
use rusqlite::{OptionalExtension, params};
use voxpost_core::{UserId, VoxpostError};

use crate::database::{Database, map_tr_err};

/// Approved posts recorded for `user` on `date`.
pub async fn usage_on(db: &Database, user: UserId, date: NaiveDate) -> Result<u32, VoxpostError> {
    let date = date.to_string();
    db.connection()
        .call(move |conn| {
            let count: Option<u32> = conn
                .query_row(
                    "SELECT usage_count FROM daily_usage WHERE user_id = ?1 AND date = ?2",
                    params![user.0, date],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(count.unwrap_or(0))
        })
        .await
        .map_err(map_tr_err)
}

/// Atomically add one to today's counter and the user's lifetime counter.
///
/// Returns the new count for `date`. The user row must exist.
pub async fn increment_usage(
    db: &Database,
    user: UserId,
    date: NaiveDate,
    at: &str,
) -> Result<u32, VoxpostError> {
    let date = date.to_string();
    let at = at.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let count: u32 = tx.query_row(
                "INSERT INTO daily_usage (user_id, date, usage_count) VALUES (?1, ?2, 1)
                 ON CONFLICT (user_id, date) DO UPDATE SET usage_count = usage_count + 1
                 RETURNING usage_count",
                params![user.0, date],
                |row| row.get(0),
            )?;
            tx.execute(
                "UPDATE users SET usage_count = usage_count + 1, last_usage = ?2 WHERE id = ?1",
                params![user.0, at],
            )?;
            tx.commit()?;
            Ok(count)
        })
        .await
        .map_err(map_tr_err)
}
