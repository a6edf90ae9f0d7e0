// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded database migrations using refinery.
//!
//! SQL migration files are compiled into the binary at build time via
//! `embed_migrations!` and applied on every [`Database::open`](crate::Database::open).

use voxpost_core::VoxpostError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Apply all pending migrations to `conn`.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), VoxpostError> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(|e| VoxpostError::Storage {
            source: Box::new(e),
        })?;
    for migration in report.applied_migrations() {
        tracing::debug!(version = migration.version(), name = migration.name(), "migration applied");
    }
    Ok(())
}
