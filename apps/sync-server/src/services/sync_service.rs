//! Sync endpoints: terminals push sales and pull catalog changes.
//!
//! ```text
//!   POST /sync/transactions   UploadRequest  ─► UploadResponse
//!   GET  /sync/transactions                  ─► [Transaction]
//!   GET  /sync/products       ?lastSync=ISO  ─► DownloadResponse
//! ```

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use till_core::protocol::{
    DownloadResponse, UploadRequest, UploadResponse, DOWNLOAD_PATH, UPLOAD_PATH,
};
use till_core::validation::validate_transaction;
use till_core::Transaction;

use crate::error::ServerError;
use crate::{tenant_id, AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(UPLOAD_PATH, get(list_transactions).post(upload_transactions))
        .route(DOWNLOAD_PATH, get(download_products))
}

/// Applies a batch. The whole batch is rejected if any transaction is
/// malformed, so the terminal keeps it pending and nothing is half-applied.
async fn upload_transactions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, ServerError> {
    let tenant_id = tenant_id(&headers);

    for tx in &request.transactions {
        validate_transaction(tx)
            .map_err(|e| ServerError::InvalidRequest(format!("transaction {}: {e}", tx.id)))?;
    }

    let outcome = state
        .store
        .apply_transactions(&tenant_id, &request.transactions)
        .await;

    info!(
        %tenant_id,
        received = request.transactions.len(),
        applied = outcome.applied,
        "Upload handled"
    );

    Ok(Json(UploadResponse {
        success: true,
        message: None,
        applied: outcome.applied,
        duplicates: outcome.duplicates,
    }))
}

#[derive(Debug, Deserialize)]
struct DownloadQuery {
    #[serde(rename = "lastSync")]
    last_sync: Option<DateTime<Utc>>,
}

async fn download_products(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<DownloadQuery>,
) -> Json<DownloadResponse> {
    let tenant_id = tenant_id(&headers);
    Json(state.store.products_since(&tenant_id, query.last_sync).await)
}

/// Everything the tenant's terminals have uploaded, oldest first.
async fn list_transactions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<Vec<Transaction>> {
    Json(state.store.transactions(&tenant_id(&headers)).await)
}
