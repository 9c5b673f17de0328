//! # Sync Cursor Repository
//!
//! Remembers the server timestamp of the last successful download, one row
//! per tenant. The next download asks only for products changed after it.
//!
//! The cursor never moves backwards on its own: `advance` with an older
//! value is ignored. `reset` is the one explicit way back to "download
//! everything".

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use super::{decode_timestamp, encode_timestamp};
use crate::error::StorageResult;

#[derive(Debug, Clone)]
pub struct CursorRepository {
    pool: SqlitePool,
}

impl CursorRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CursorRepository { pool }
    }

    /// Last download watermark, or `None` before the first sync.
    pub async fn get(&self, tenant_id: &str) -> StorageResult<Option<DateTime<Utc>>> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT last_sync FROM sync_cursor WHERE tenant_id = ?1")
                .bind(tenant_id)
                .fetch_optional(&self.pool)
                .await?;

        raw.map(|value| decode_timestamp("sync_cursor.last_sync", &value))
            .transpose()
    }

    /// Moves the cursor to `to` if that is later than the stored value.
    ///
    /// Returns the cursor as stored after the call.
    pub async fn advance(&self, tenant_id: &str, to: DateTime<Utc>) -> StorageResult<DateTime<Utc>> {
        let result = sqlx::query(
            r#"
            INSERT INTO sync_cursor (tenant_id, last_sync, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(tenant_id) DO UPDATE SET
                last_sync  = excluded.last_sync,
                updated_at = excluded.updated_at
            WHERE excluded.last_sync > sync_cursor.last_sync
            "#,
        )
        .bind(tenant_id)
        .bind(encode_timestamp(&to))
        .bind(encode_timestamp(&Utc::now()))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            warn!(tenant_id, to = %to, "Ignoring backwards cursor move");
        } else {
            debug!(tenant_id, to = %to, "Cursor advanced");
        }

        // the row exists after the upsert either way
        Ok(self.get(tenant_id).await?.unwrap_or(to))
    }

    /// Forgets the watermark so the next download fetches the full catalog.
    pub async fn reset(&self, tenant_id: &str) -> StorageResult<()> {
        sqlx::query("DELETE FROM sync_cursor WHERE tenant_id = ?1")
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;

        info!(tenant_id, "Sync cursor reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};
    use chrono::{Duration, TimeZone, Utc};
    use till_core::DEFAULT_TENANT_ID;

    #[tokio::test]
    async fn test_cursor_starts_empty() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.cursor().get(DEFAULT_TENANT_ID).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cursor_only_moves_forward() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let cursor = db.cursor();
        let t1 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let t2 = t1 + Duration::seconds(30);

        assert_eq!(cursor.advance(DEFAULT_TENANT_ID, t1).await.unwrap(), t1);
        assert_eq!(cursor.advance(DEFAULT_TENANT_ID, t2).await.unwrap(), t2);

        // backwards and equal moves keep the stored value
        assert_eq!(cursor.advance(DEFAULT_TENANT_ID, t1).await.unwrap(), t2);
        assert_eq!(cursor.advance(DEFAULT_TENANT_ID, t2).await.unwrap(), t2);
        assert_eq!(cursor.get(DEFAULT_TENANT_ID).await.unwrap(), Some(t2));
    }

    #[tokio::test]
    async fn test_cursor_reset_and_tenant_isolation() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let cursor = db.cursor();
        let t1 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();

        cursor.advance(DEFAULT_TENANT_ID, t1).await.unwrap();
        cursor.advance("tenant-b", t1).await.unwrap();

        cursor.reset(DEFAULT_TENANT_ID).await.unwrap();
        assert!(cursor.get(DEFAULT_TENANT_ID).await.unwrap().is_none());
        assert_eq!(cursor.get("tenant-b").await.unwrap(), Some(t1));

        // after a reset any value is accepted again
        let earlier = t1 - Duration::days(1);
        assert_eq!(cursor.advance(DEFAULT_TENANT_ID, earlier).await.unwrap(), earlier);
    }
}
