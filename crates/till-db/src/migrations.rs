//! Local Store schema, embedded at compile time from `migrations/sqlite`.
//!
//! ```text
//!   Database::new ──► MIGRATOR.run ──► _sqlx_migrations
//!                          │
//!                          └─ 001_initial_schema.sql   products, transactions, sync_cursor
//! ```
//!
//! Schema changes ship as a new `NNN_description.sql` file. Files that have
//! been released are never edited: sqlx checksums them and refuses to start
//! against a database that applied a different version.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::StorageResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies every embedded migration the database has not seen yet.
pub async fn run_migrations(pool: &SqlitePool) -> StorageResult<()> {
    let before = schema_status(pool).await?;
    debug!(applied = before.applied, total = before.total, "Checking Local Store schema");

    MIGRATOR.run(pool).await?;

    if before.pending() > 0 {
        info!(applied = before.pending(), "Local Store schema migrated");
    }
    Ok(())
}

/// How far the database is behind the embedded migrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaStatus {
    pub total: usize,
    pub applied: usize,
}

impl SchemaStatus {
    pub fn pending(&self) -> usize {
        self.total.saturating_sub(self.applied)
    }
}

pub async fn schema_status(pool: &SqlitePool) -> StorageResult<SchemaStatus> {
    // a fresh file has no bookkeeping table yet
    let has_table: i64 = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations')",
    )
    .fetch_one(pool)
    .await?;

    let applied: i64 = if has_table != 0 {
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?
    } else {
        0
    };

    Ok(SchemaStatus {
        total: MIGRATOR.migrations.len(),
        applied: usize::try_from(applied).unwrap_or_default(),
    })
}
