//! # Till Sync Server
//!
//! Reference HTTP server terminals sync against.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Sync Server Routes                             │
//! │                                                                         │
//! │  ┌──────────────────────┐  ┌──────────────────────┐  ┌──────────────┐  │
//! │  │  sync_service        │  │  stock_service       │  │ health       │  │
//! │  │                      │  │                      │  │              │  │
//! │  │ • POST /sync/        │  │ • POST /stock        │  │ • GET        │  │
//! │  │   transactions       │  │ • GET  /stock        │  │   /health    │  │
//! │  │ • GET  /sync/        │  │                      │  │              │  │
//! │  │   products           │  │                      │  │              │  │
//! │  └──────────┬───────────┘  └──────────┬───────────┘  └──────────────┘  │
//! │             └───────────┬─────────────┘                                 │
//! │                         ▼                                               │
//! │              ┌──────────────────────┐                                   │
//! │              │ CatalogStore         │  per tenant, volatile             │
//! │              └──────────────────────┘                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `TILL_SERVER_BIND` - interface (default: 0.0.0.0)
//! - `TILL_SERVER_PORT` - HTTP port (default: 3000)
//! - `TILL_SERVER_SEED` - JSON catalog file to load at startup
//! - `TILL_SERVER_DEMO_SEED` - seed the demo catalog when no file is set (default: true)
//! - `RUST_LOG` - log filter

pub mod config;
pub mod error;
pub mod services;
pub mod store;

use std::future::Future;
use std::sync::Arc;

use axum::http::HeaderMap;
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use till_core::protocol::TENANT_HEADER;
use till_core::DEFAULT_TENANT_ID;

pub use config::{ConfigError, ServerConfig};
pub use error::ServerError;
pub use store::{ApplyOutcome, CatalogStore};

/// Shared application state.
pub struct AppState {
    pub store: CatalogStore,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        AppState {
            store: CatalogStore::new(),
            config,
        }
    }

    /// Loads the configured seed: the seed file if set, else the demo
    /// catalog if enabled.
    pub async fn seed(&self) -> Result<usize, ConfigError> {
        let products = match &self.config.seed_path {
            Some(path) => store::load_seed_file(path)?,
            None if self.config.demo_seed => store::demo_catalog(),
            None => Vec::new(),
        };
        Ok(self.store.seed(products).await)
    }
}

/// Builds the full router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(services::sync_service::routes())
        .merge(services::stock_service::routes())
        .merge(services::health_service::routes())
        .with_state(state)
}

/// Serves until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Sync server listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Tenant named by `X-Tenant-Id`, or the default tenant.
pub(crate) fn tenant_id(headers: &HeaderMap) -> String {
    headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_TENANT_ID)
        .to_string()
}
