//! Upload pipeline: pending transactions to the server, whole batch or nothing.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tracing::{debug, info, warn};

use till_db::Database;

use crate::error::{SyncError, SyncOperation, SyncResult};
use crate::transport::SyncTransport;

/// Drains the tenant's pending transactions in one request.
///
/// ## Failure Semantics
/// Any failure (network, non-2xx, `success:false`, timeout) leaves every
/// transaction `pending`. The server applies by id, so resending the same
/// batch on the next cycle is safe.
#[derive(Clone)]
pub struct UploadPipeline {
    db: Database,
    transport: Arc<dyn SyncTransport>,
    tenant_id: String,
    timeout: Duration,
}

impl UploadPipeline {
    pub fn new(
        db: Database,
        transport: Arc<dyn SyncTransport>,
        tenant_id: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        UploadPipeline {
            db,
            transport,
            tenant_id: tenant_id.into(),
            timeout,
        }
    }

    /// Uploads everything pending and returns how many were acknowledged.
    pub async fn upload_pending(&self) -> SyncResult<usize> {
        let pending = self.db.transactions().list_pending(&self.tenant_id).await?;

        if pending.is_empty() {
            debug!("Nothing pending, skipping upload");
            return Ok(0);
        }

        debug!(count = pending.len(), "Uploading pending transactions");

        let response = time::timeout(
            self.timeout,
            self.transport.upload_transactions(&self.tenant_id, &pending),
        )
        .await
        .map_err(|_| SyncError::Timeout {
            operation: SyncOperation::Upload,
            after: self.timeout,
        })?
        .map_err(|e| SyncError::Upload(e.to_string()))?;

        if !response.success {
            let reason = response
                .message
                .unwrap_or_else(|| "server rejected batch".to_string());
            warn!(count = pending.len(), %reason, "Upload not accepted");
            return Err(SyncError::Upload(reason));
        }

        let ids: Vec<String> = pending.into_iter().map(|t| t.id).collect();
        let acknowledged = self.db.transactions().mark_acknowledged(&ids).await?;

        info!(
            sent = ids.len(),
            acknowledged,
            duplicates = response.duplicates,
            "Upload acknowledged"
        );
        Ok(acknowledged as usize)
    }
}
