//! # Download Pipeline
//!
//! Pulls catalog changes since the cursor and applies them to the Local Store.
//!
//! ## Ordering
//! ```text
//!   cursor ──► GET /sync/products?lastSync=cursor
//!                 │
//!                 ├── error / timeout ──► Download error, cursor untouched
//!                 ▼
//!              upsert_many(products)   (one SQL transaction)
//!                 │
//!                 ├── storage error ────► Storage error, cursor untouched
//!                 ▼
//!              cursor.advance(response.timestamp)
//! ```
//!
//! The cursor moves only after the products it covers are committed, so a
//! crash between the two steps re-downloads the same page instead of
//! skipping it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time;
use tracing::{debug, info};

use till_db::Database;

use crate::error::{SyncError, SyncOperation, SyncResult};
use crate::transport::SyncTransport;

/// Outcome of one successful download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadReport {
    /// Products written to the Local Store.
    pub applied: usize,

    /// Cursor after the download.
    pub cursor: DateTime<Utc>,
}

#[derive(Clone)]
pub struct DownloadPipeline {
    db: Database,
    transport: Arc<dyn SyncTransport>,
    tenant_id: String,
    timeout: Duration,
}

impl DownloadPipeline {
    pub fn new(
        db: Database,
        transport: Arc<dyn SyncTransport>,
        tenant_id: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        DownloadPipeline {
            db,
            transport,
            tenant_id: tenant_id.into(),
            timeout,
        }
    }

    /// Downloads from the stored cursor.
    pub async fn sync(&self) -> SyncResult<DownloadReport> {
        let cursor = self.db.cursor().get(&self.tenant_id).await?;
        self.download_updates(cursor).await
    }

    /// Downloads everything changed after `cursor` (everything when `None`).
    pub async fn download_updates(
        &self,
        cursor: Option<DateTime<Utc>>,
    ) -> SyncResult<DownloadReport> {
        debug!(cursor = ?cursor, "Downloading product updates");

        let response = time::timeout(
            self.timeout,
            self.transport.fetch_products(&self.tenant_id, cursor),
        )
        .await
        .map_err(|_| SyncError::Timeout {
            operation: SyncOperation::Download,
            after: self.timeout,
        })?
        .map_err(|e| SyncError::Download(e.to_string()))?;

        let applied = self.db.products().upsert_many(&response.products).await?;
        let cursor = self
            .db
            .cursor()
            .advance(&self.tenant_id, response.timestamp)
            .await?;

        info!(applied, cursor = %cursor, "Download applied");
        Ok(DownloadReport { applied, cursor })
    }
}
