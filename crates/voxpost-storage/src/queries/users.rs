// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User registration, tariff and acquirer binding tokens.

use rusqlite::{OptionalExtension, Row, params};
use voxpost_core::{Tariff, UserId, VoxpostError};

use crate::database::{Database, map_tr_err, parse_col};
use crate::models::User;

const USER_COLUMNS: &str = "id, handle, tariff, usage_count, last_usage, created_at, \
     referral_code, referred_by, acq_customer_token, acq_method_token";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(row.get(0)?),
        handle: row.get(1)?,
        tariff: parse_col(2, row.get(2)?)?,
        usage_count: row.get(3)?,
        last_usage: row.get(4)?,
        created_at: row.get(5)?,
        referral_code: row.get(6)?,
        referred_by: row.get::<_, Option<i64>>(7)?.map(UserId),
        acq_customer_token: row.get(8)?,
        acq_method_token: row.get(9)?,
    })
}

fn new_referral_code() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..10].to_uppercase()
}

/// Register the user if unknown and refresh the handle if it changed.
///
/// Returns the stored row and whether it was created by this call.
pub async fn ensure_user(
    db: &Database,
    id: UserId,
    handle: Option<&str>,
) -> Result<(User, bool), VoxpostError> {
    let handle = handle.map(str::to_string);
    let code = new_referral_code();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let created = tx.execute(
                "INSERT INTO users (id, handle, referral_code) VALUES (?1, ?2, ?3)
                 ON CONFLICT (id) DO NOTHING",
                params![id.0, handle, code],
            )? == 1;
            if !created && handle.is_some() {
                tx.execute(
                    "UPDATE users SET handle = ?2 WHERE id = ?1 AND handle IS NOT ?2",
                    params![id.0, handle],
                )?;
            }
            let user = tx.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.0],
                user_from_row,
            )?;
            tx.commit()?;
            Ok((user, created))
        })
        .await
        .map_err(map_tr_err)
}

/// Get a user by id.
pub async fn get_user(db: &Database, id: UserId) -> Result<Option<User>, VoxpostError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.0],
                user_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Set the user's tariff.
pub async fn set_tariff(db: &Database, id: UserId, tariff: Tariff) -> Result<(), VoxpostError> {
    let tariff = tariff.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE users SET tariff = ?2 WHERE id = ?1",
                params![id.0, tariff],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Resolve a referral code to its owner.
pub async fn find_by_referral_code(
    db: &Database,
    code: &str,
) -> Result<Option<UserId>, VoxpostError> {
    let code = code.trim().to_uppercase();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id FROM users WHERE referral_code = ?1",
                params![code],
                |row| row.get::<_, i64>(0),
            )
            .optional()
        })
        .await
        .map(|id| id.map(UserId))
        .map_err(map_tr_err)
}

/// Record who referred `id`. Only the first referrer sticks; self-referral is ignored.
pub async fn set_referred_by(
    db: &Database,
    id: UserId,
    referrer: UserId,
) -> Result<bool, VoxpostError> {
    if id == referrer {
        return Ok(false);
    }
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE users SET referred_by = ?2 WHERE id = ?1 AND referred_by IS NULL",
                params![id.0, referrer.0],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Remember the acquirer tokens so later charges can reuse them.
pub async fn set_acquirer_tokens(
    db: &Database,
    id: UserId,
    customer_token: &str,
    method_token: &str,
) -> Result<(), VoxpostError> {
    let customer_token = customer_token.to_string();
    let method_token = method_token.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE users SET acq_customer_token = ?2, acq_method_token = ?3 WHERE id = ?1",
                params![id.0, customer_token, method_token],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup() -> (tempfile::TempDir, Database) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("users.db").to_str().unwrap())
            .await
            .unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn ensure_user_creates_once() {
        let (_dir, db) = setup().await;
        let (user, created) = ensure_user(&db, UserId(42), Some("alice")).await.unwrap();
        assert!(created);
        assert_eq!(user.tariff, Tariff::Free);
        assert_eq!(user.handle.as_deref(), Some("alice"));
        assert_eq!(user.referral_code.as_ref().map(String::len), Some(10));

        let (again, created) = ensure_user(&db, UserId(42), Some("alice_new")).await.unwrap();
        assert!(!created);
        assert_eq!(again.handle.as_deref(), Some("alice_new"));
        assert_eq!(again.referral_code, user.referral_code);
    }

    #[tokio::test]
    async fn missing_user_is_none() {
        let (_dir, db) = setup().await;
        assert!(get_user(&db, UserId(7)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn tariff_and_tokens_are_persisted() {
        let (_dir, db) = setup().await;
        ensure_user(&db, UserId(1), None).await.unwrap();
        set_tariff(&db, UserId(1), Tariff::Paid).await.unwrap();
        set_acquirer_tokens(&db, UserId(1), "cust_1", "pm_1").await.unwrap();

        let user = get_user(&db, UserId(1)).await.unwrap().unwrap();
        assert_eq!(user.tariff, Tariff::Paid);
        assert_eq!(user.acq_customer_token.as_deref(), Some("cust_1"));
        assert_eq!(user.acq_method_token.as_deref(), Some("pm_1"));
    }

    #[tokio::test]
    async fn referral_is_recorded_once() {
        let (_dir, db) = setup().await;
        let (referrer, _) = ensure_user(&db, UserId(1), None).await.unwrap();
        ensure_user(&db, UserId(2), None).await.unwrap();
        ensure_user(&db, UserId(3), None).await.unwrap();

        let code = referrer.referral_code.unwrap();
        let found = find_by_referral_code(&db, &code.to_lowercase()).await.unwrap();
        assert_eq!(found, Some(UserId(1)));

        assert!(set_referred_by(&db, UserId(2), UserId(1)).await.unwrap());
        assert!(!set_referred_by(&db, UserId(2), UserId(3)).await.unwrap());
        assert!(!set_referred_by(&db, UserId(3), UserId(3)).await.unwrap());

        let user = get_user(&db, UserId(2)).await.unwrap().unwrap();
        assert_eq!(user.referred_by, Some(UserId(1)));
    }
}
