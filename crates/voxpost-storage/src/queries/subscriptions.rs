// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subscription rows and the applied-payment ledger.
//!
//! Every multi-step transition runs inside one transaction on the writer
//! thread, so the "one active row per user" index and the payment-token
//! ledger are checked and updated atomically.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, Transaction, params};
use voxpost_core::{Tariff, UserId, VoxpostError};

use crate::database::{Database, fmt_ts, map_tr_err, parse_col, parse_ts};
use crate::models::{PaymentEvent, PaymentEventKind, Subscription, SubscriptionStatus};

const SUB_COLUMNS: &str = "id, user_id, subscription_id, tariff, status, amount, next_payment, \
     last_payment, created_at, cancelled_at, active, acq_customer_token, acq_method_token, \
     acq_last_payment_token, failure_count, last_error";

fn subscription_from_row(row: &Row<'_>) -> rusqlite::Result<Subscription> {
    let created_at = parse_ts(8, Some(row.get(8)?))?.unwrap_or_default();
    Ok(Subscription {
        id: row.get(0)?,
        user_id: UserId(row.get(1)?),
        subscription_id: row.get(2)?,
        tariff: parse_col(3, row.get(3)?)?,
        status: parse_col(4, row.get(4)?)?,
        amount: row.get(5)?,
        next_payment: parse_ts(6, row.get(6)?)?,
        last_payment: parse_ts(7, row.get(7)?)?,
        created_at,
        cancelled_at: parse_ts(9, row.get(9)?)?,
        active: row.get(10)?,
        acq_customer_token: row.get(11)?,
        acq_method_token: row.get(12)?,
        acq_last_payment_token: row.get(13)?,
        failure_count: row.get(14)?,
        last_error: row.get(15)?,
    })
}

fn active_row(tx: &Transaction<'_>, user: UserId) -> rusqlite::Result<Option<Subscription>> {
    tx.query_row(
        &format!("SELECT {SUB_COLUMNS} FROM subscriptions WHERE user_id = ?1 AND active = 1"),
        params![user.0],
        subscription_from_row,
    )
    .optional()
}

fn row_by_id(tx: &Transaction<'_>, id: i64) -> rusqlite::Result<Subscription> {
    tx.query_row(
        &format!("SELECT {SUB_COLUMNS} FROM subscriptions WHERE id = ?1"),
        params![id],
        subscription_from_row,
    )
}

/// Users referenced by payments may not have talked to the bot yet.
fn ensure_user_row(tx: &Transaction<'_>, user: UserId) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO users (id) VALUES (?1) ON CONFLICT (id) DO NOTHING",
        params![user.0],
    )?;
    Ok(())
}

/// Result of [`open_pending`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingOutcome {
    /// A pending row was created or refreshed.
    Opened(Subscription),
    /// The user already has a non-pending active subscription.
    AlreadyActive(Subscription),
}

/// Create (or refresh) the user's pending subscription.
pub async fn open_pending(
    db: &Database,
    user: UserId,
    tariff: Tariff,
    amount: i64,
    now: DateTime<Utc>,
    next_payment: DateTime<Utc>,
) -> Result<PendingOutcome, VoxpostError> {
    let tariff = tariff.to_string();
    let now = fmt_ts(now);
    let next = fmt_ts(next_payment);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            ensure_user_row(&tx, user)?;
            let id = match active_row(&tx, user)? {
                Some(existing) if existing.status != SubscriptionStatus::Pending => {
                    return Ok(PendingOutcome::AlreadyActive(existing));
                }
                Some(existing) => {
                    tx.execute(
                        "UPDATE subscriptions SET tariff = ?2, amount = ?3, next_payment = ?4
                         WHERE id = ?1",
                        params![existing.id, tariff, amount, next],
                    )?;
                    existing.id
                }
                None => {
                    tx.execute(
                        "INSERT INTO subscriptions (user_id, tariff, status, amount, next_payment,
                             created_at, active)
                         VALUES (?1, ?2, 'pending', ?3, ?4, ?5, 1)",
                        params![user.0, tariff, amount, next, now],
                    )?;
                    tx.last_insert_rowid()
                }
            };
            let sub = row_by_id(&tx, id)?;
            tx.commit()?;
            Ok(PendingOutcome::Opened(sub))
        })
        .await
        .map_err(map_tr_err)
}

/// Remember the acquirer id of the payment that opened a subscription.
pub async fn set_subscription_payment(
    db: &Database,
    id: i64,
    payment_id: &str,
) -> Result<(), VoxpostError> {
    let payment_id = payment_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE subscriptions SET subscription_id = ?2 WHERE id = ?1",
                params![id, payment_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// The user's active row (pending or active status), if any.
pub async fn get_active(db: &Database, user: UserId) -> Result<Option<Subscription>, VoxpostError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let sub = active_row(&tx, user)?;
            tx.commit()?;
            Ok(sub)
        })
        .await
        .map_err(map_tr_err)
}

/// Every row for the user, newest first.
pub async fn list_for_user(db: &Database, user: UserId) -> Result<Vec<Subscription>, VoxpostError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SUB_COLUMNS} FROM subscriptions WHERE user_id = ?1 ORDER BY id DESC"
            ))?;
            let rows = stmt.query_map(params![user.0], subscription_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Inputs for [`activate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    pub user: UserId,
    pub customer_token: String,
    pub method_token: String,
    pub payment_token: String,
    pub amount: i64,
    pub now: DateTime<Utc>,
    pub next_payment: DateTime<Utc>,
}

/// Result of [`activate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationOutcome {
    Activated(Subscription),
    /// The payment token was already applied; nothing changed.
    Duplicate(Option<Subscription>),
}

/// Apply a confirmed payment: mark the subscription active, bind tokens and
/// upgrade the user. Keyed on the payment token.
pub async fn activate(db: &Database, a: Activation) -> Result<ActivationOutcome, VoxpostError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            ensure_user_row(&tx, a.user)?;

            let now = fmt_ts(a.now);
            let next = fmt_ts(a.next_payment);
            let fresh = tx.execute(
                "INSERT INTO payment_events (payment_token, user_id, kind, status, amount, created_at)
                 VALUES (?1, ?2, 'activation', 'succeeded', ?3, ?4)
                 ON CONFLICT (payment_token) DO NOTHING",
                params![a.payment_token, a.user.0, a.amount, now],
            )? == 1;
            if !fresh {
                let sub = active_row(&tx, a.user)?;
                tx.commit()?;
                return Ok(ActivationOutcome::Duplicate(sub));
            }

            let id = match active_row(&tx, a.user)? {
                Some(existing) => {
                    tx.execute(
                        "UPDATE subscriptions SET status = 'active', amount = ?2,
                             last_payment = ?3, next_payment = ?4, acq_customer_token = ?5,
                             acq_method_token = ?6, acq_last_payment_token = ?7,
                             subscription_id = COALESCE(subscription_id, ?7),
                             failure_count = 0, last_error = NULL
                         WHERE id = ?1",
                        params![
                            existing.id,
                            a.amount,
                            now,
                            next,
                            a.customer_token,
                            a.method_token,
                            a.payment_token
                        ],
                    )?;
                    existing.id
                }
                None => {
                    tx.execute(
                        "INSERT INTO subscriptions (user_id, subscription_id, tariff, status, amount,
                             next_payment, last_payment, created_at, active, acq_customer_token,
                             acq_method_token, acq_last_payment_token)
                         VALUES (?1, ?2, 'paid', 'active', ?3, ?4, ?5, ?5, 1, ?6, ?7, ?2)",
                        params![
                            a.user.0,
                            a.payment_token,
                            a.amount,
                            next,
                            now,
                            a.customer_token,
                            a.method_token
                        ],
                    )?;
                    tx.last_insert_rowid()
                }
            };

            tx.execute(
                "UPDATE users SET tariff = 'paid', acq_customer_token = ?2, acq_method_token = ?3
                 WHERE id = ?1",
                params![a.user.0, a.customer_token, a.method_token],
            )?;
            let sub = row_by_id(&tx, id)?;
            tx.commit()?;
            Ok(ActivationOutcome::Activated(sub))
        })
        .await
        .map_err(map_tr_err)
}

/// Stop renewing the user's active subscription. Returns the cancelled row,
/// or `None` when there was nothing to cancel.
pub async fn cancel(
    db: &Database,
    user: UserId,
    now: DateTime<Utc>,
) -> Result<Option<Subscription>, VoxpostError> {
    let now = fmt_ts(now);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let Some(existing) = active_row(&tx, user)? else {
                return Ok(None);
            };
            tx.execute(
                "UPDATE subscriptions SET active = 0, status = 'cancelled', cancelled_at = ?2
                 WHERE id = ?1",
                params![existing.id, now],
            )?;
            let sub = row_by_id(&tx, existing.id)?;
            tx.commit()?;
            Ok(Some(sub))
        })
        .await
        .map_err(map_tr_err)
}

/// Active subscriptions whose next payment is due and that can be charged.
pub async fn due_for_renewal(
    db: &Database,
    now: DateTime<Utc>,
) -> Result<Vec<Subscription>, VoxpostError> {
    let now = fmt_ts(now);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SUB_COLUMNS} FROM subscriptions
                 WHERE active = 1 AND status = 'active' AND next_payment <= ?1
                   AND acq_method_token IS NOT NULL AND acq_method_token != ''
                 ORDER BY next_payment ASC"
            ))?;
            let rows = stmt.query_map(params![now], subscription_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Record a successful recurring charge. Returns `false` if the payment
/// token had already been applied.
pub async fn record_renewal(
    db: &Database,
    id: i64,
    payment_token: &str,
    amount: i64,
    now: DateTime<Utc>,
    next_payment: DateTime<Utc>,
) -> Result<bool, VoxpostError> {
    let token = payment_token.to_string();
    let now = fmt_ts(now);
    let next = fmt_ts(next_payment);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let user: i64 = tx.query_row(
                "SELECT user_id FROM subscriptions WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )?;
            let fresh = tx.execute(
                "INSERT INTO payment_events (payment_token, user_id, kind, status, amount, created_at)
                 VALUES (?1, ?2, 'renewal', 'succeeded', ?3, ?4)
                 ON CONFLICT (payment_token) DO NOTHING",
                params![token, user, amount, now],
            )? == 1;
            if fresh {
                tx.execute(
                    "UPDATE subscriptions SET last_payment = ?2, next_payment = ?3,
                         acq_last_payment_token = ?4, failure_count = 0, last_error = NULL
                     WHERE id = ?1",
                    params![id, now, next, token],
                )?;
            }
            tx.commit()?;
            Ok(fresh)
        })
        .await
        .map_err(map_tr_err)
}

/// Count a failed recurring charge. At `max_failures` consecutive failures the
/// subscription expires and the user drops to the free tariff.
pub async fn record_failure(
    db: &Database,
    id: i64,
    error: &str,
    max_failures: u32,
) -> Result<Subscription, VoxpostError> {
    let error = error.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE subscriptions SET failure_count = failure_count + 1, last_error = ?2
                 WHERE id = ?1",
                params![id, error],
            )?;
            let mut sub = row_by_id(&tx, id)?;
            if sub.failure_count >= max_failures {
                tx.execute(
                    "UPDATE subscriptions SET status = 'expired', active = 0 WHERE id = ?1",
                    params![id],
                )?;
                tx.execute(
                    "UPDATE users SET tariff = 'free' WHERE id = ?1",
                    params![sub.user_id.0],
                )?;
                sub = row_by_id(&tx, id)?;
            }
            tx.commit()?;
            Ok(sub)
        })
        .await
        .map_err(map_tr_err)
}

/// Push the next attempt out while a pending charge settles.
pub async fn defer_renewal(
    db: &Database,
    id: i64,
    until: DateTime<Utc>,
    payment_token: &str,
) -> Result<(), VoxpostError> {
    let until = fmt_ts(until);
    let token = payment_token.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE subscriptions SET next_payment = ?2, acq_last_payment_token = ?3
                 WHERE id = ?1",
                params![id, until, token],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Drop users to free once every cancelled subscription's paid period is over.
/// Returns the users that were downgraded.
pub async fn downgrade_lapsed(
    db: &Database,
    now: DateTime<Utc>,
) -> Result<Vec<UserId>, VoxpostError> {
    let now = fmt_ts(now);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let users: Vec<i64> = {
                let mut stmt = tx.prepare(
                    "SELECT DISTINCT s.user_id FROM subscriptions s
                     JOIN users u ON u.id = s.user_id
                     WHERE u.tariff = 'paid' AND s.status = 'cancelled' AND s.next_payment <= ?1
                       AND NOT EXISTS (
                           SELECT 1 FROM subscriptions a WHERE a.user_id = s.user_id AND a.active = 1)
                       AND NOT EXISTS (
                           SELECT 1 FROM subscriptions c WHERE c.user_id = s.user_id
                             AND c.status = 'cancelled' AND c.next_payment > ?1)",
                )?;
                let rows = stmt.query_map(params![now], |row| row.get(0))?;
                rows.collect::<rusqlite::Result<_>>()?
            };
            for user in &users {
                tx.execute("UPDATE users SET tariff = 'free' WHERE id = ?1", params![user])?;
            }
            tx.commit()?;
            Ok(users.into_iter().map(UserId).collect())
        })
        .await
        .map_err(map_tr_err)
}

/// Look up an applied payment by token.
pub async fn get_payment_event(
    db: &Database,
    payment_token: &str,
) -> Result<Option<PaymentEvent>, VoxpostError> {
    let token = payment_token.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT payment_token, user_id, kind, status, amount, created_at
                 FROM payment_events WHERE payment_token = ?1",
                params![token],
                |row| {
                    Ok(PaymentEvent {
                        payment_token: row.get(0)?,
                        user_id: UserId(row.get(1)?),
                        kind: parse_col::<PaymentEventKind>(2, row.get(2)?)?,
                        status: row.get(3)?,
                        amount: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Number of applied payments for a user.
pub async fn count_payment_events(db: &Database, user: UserId) -> Result<i64, VoxpostError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM payment_events WHERE user_id = ?1",
                params![user.0],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}
