//! # Sync Transport
//!
//! The seam between the pipelines and the network.
//!
//! ## Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  UploadPipeline / DownloadPipeline / ConnectivityMonitor probe         │
//! │       │                                                                 │
//! │       │  dyn SyncTransport                                             │
//! │       ▼                                                                 │
//! │  ┌──────────────────────────┐        ┌──────────────────────────────┐  │
//! │  │ HttpTransport (reqwest)  │        │ ScriptedTransport (tests)    │  │
//! │  │ JSON over HTTP(S)        │        │ counts calls, can fail/block │  │
//! │  └──────────────────────────┘        └──────────────────────────────┘  │
//! │                                                                         │
//! │  Transport errors carry no policy. The pipelines decide what a failure │
//! │  means for local state.                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use till_core::protocol::{
    DownloadResponse, UploadResponse, DOWNLOAD_PATH, HEALTH_PATH, LAST_SYNC_PARAM,
    TENANT_HEADER, UPLOAD_PATH,
};
use till_core::Transaction;

/// Failure talking to the server.
#[derive(Debug, Error)]
pub enum TransportError {
    /// DNS, connect, reset, client-side timeout.
    #[error("network error: {0}")]
    Network(String),

    /// Server answered with a non-2xx status.
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// 2xx with a body we could not parse.
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

/// Wire operations the sync engine needs from a server.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// `POST /sync/transactions` with the whole batch.
    async fn upload_transactions(
        &self,
        tenant_id: &str,
        transactions: &[Transaction],
    ) -> Result<UploadResponse, TransportError>;

    /// `GET /sync/products`, with `lastSync` when a cursor exists.
    async fn fetch_products(
        &self,
        tenant_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<DownloadResponse, TransportError>;

    /// `GET /health`. Ok means the server is reachable.
    async fn probe(&self) -> Result<(), TransportError>;
}

// =============================================================================
// HTTP Transport
// =============================================================================

#[derive(Serialize)]
struct UploadBody<'a> {
    transactions: &'a [Transaction],
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Builds a client whose every request is bounded by `timeout`.
    pub fn new(base_url: &Url, timeout: Duration) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| SyncError::Internal(format!("HTTP client: {e}")))?;

        Ok(HttpTransport {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &SyncConfig) -> SyncResult<Self> {
        Self::new(&config.server_url()?, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl SyncTransport for HttpTransport {
    async fn upload_transactions(
        &self,
        tenant_id: &str,
        transactions: &[Transaction],
    ) -> Result<UploadResponse, TransportError> {
        debug!(count = transactions.len(), "POST {}", UPLOAD_PATH);

        let response = self
            .client
            .post(self.endpoint(UPLOAD_PATH))
            .header(TENANT_HEADER, tenant_id)
            .json(&UploadBody { transactions })
            .send()
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }

    async fn fetch_products(
        &self,
        tenant_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<DownloadResponse, TransportError> {
        debug!(since = ?since, "GET {}", DOWNLOAD_PATH);

        let mut request = self
            .client
            .get(self.endpoint(DOWNLOAD_PATH))
            .header(TENANT_HEADER, tenant_id);

        if let Some(ts) = since {
            request = request.query(&[(
                LAST_SYNC_PARAM,
                ts.to_rfc3339_opts(SecondsFormat::Nanos, true),
            )]);
        }

        let response = request.send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn probe(&self) -> Result<(), TransportError> {
        let response = self.client.get(self.endpoint(HEALTH_PATH)).send().await?;
        match response.status() {
            StatusCode::OK => Ok(()),
            other => Err(TransportError::Status {
                status: other.as_u16(),
                body: String::new(),
            }),
        }
    }
}

// =============================================================================
// Test Transport
// =============================================================================
