// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use voxpost_core::{AdapterType, HealthStatus, PluginAdapter, VoxpostError};

/// Convert a tokio-rusqlite error into [`VoxpostError::Storage`].
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> VoxpostError {
    VoxpostError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the SQLite database.
pub struct Database {
    conn: tokio_rusqlite::Connection,
    path: String,
}

impl Database {
    /// Open (creating if needed) the database at `path` and apply migrations.
    pub async fn open(path: &str) -> Result<Self, VoxpostError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| VoxpostError::Storage {
                source: Box::new(e),
            })?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| VoxpostError::Storage {
                source: Box::new(e),
            })?;

        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.busy_timeout(Duration::from_secs(5))?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(|conn| Ok::<_, rusqlite::Error>(crate::migrations::run_migrations(conn)))
            .await
            .map_err(map_tr_err)??;

        debug!(path, "database opened");
        Ok(Self {
            conn,
            path: path.to_string(),
        })
    }

    /// The underlying single-writer connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Checkpoint the WAL so the main file is self-contained.
    pub async fn checkpoint(&self) -> Result<(), VoxpostError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for Database {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, VoxpostError> {
        let probe = self
            .conn
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT 1", [], |row| row.get(0))
            })
            .await;
        Ok(match probe {
            Ok(_) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), VoxpostError> {
        self.checkpoint().await
    }
}

/// Render a timestamp the way every table stores it.
pub fn fmt_ts(ts: chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Parse a stored timestamp column.
pub(crate) fn parse_ts(
    idx: usize,
    raw: Option<String>,
) -> rusqlite::Result<Option<chrono::DateTime<chrono::Utc>>> {
    raw.map(|s| {
        chrono::DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
            })
    })
    .transpose()
}

/// Parse a TEXT column into a `FromStr` type such as an enum.
pub(crate) fn parse_col<T>(idx: usize, raw: String) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_file_and_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/voxpost.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        assert!(path.exists());

        let tables: Vec<String> = db
            .connection()
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .unwrap();
        for expected in ["daily_usage", "payment_events", "post_history", "subscriptions", "users"] {
            assert!(tables.iter().any(|t| t == expected), "missing table {expected}");
        }
    }

    #[tokio::test]
    async fn reopening_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("voxpost.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        db.shutdown().await.unwrap();
        drop(db);
        Database::open(path.to_str().unwrap()).await.unwrap();
    }

    #[tokio::test]
    async fn health_check_reports_healthy() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("h.db").to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(db.health_check().await.unwrap(), HealthStatus::Healthy);
        assert_eq!(db.adapter_type(), AdapterType::Storage);
    }

    #[test]
    fn timestamps_round_trip_through_text() {
        let ts = chrono::DateTime::parse_from_rfc3339("2026-03-01T10:20:30.123Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let text = fmt_ts(ts);
        assert_eq!(text, "2026-03-01T10:20:30.123Z");
        assert_eq!(parse_ts(0, Some(text)).unwrap(), Some(ts));
    }
}
