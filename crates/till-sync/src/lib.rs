//! # till-sync: Sync Engine for Till POS
//!
//! Keeps a terminal's Local Store and the sync server in step while the
//! register keeps selling, online or not.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Engine Architecture                         │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 SyncOrchestrator (one cycle at a time)           │  │
//! │  │                                                                  │  │
//! │  │  Driven by connectivity edges, the interval and sale triggers    │  │
//! │  │  Publishes SyncStatus on a watch channel                         │  │
//! │  └───────────┬───────────────────────┬──────────────────────────────┘  │
//! │              │ 1                     │ 2                                │
//! │              ▼                       ▼                                  │
//! │  ┌────────────────────┐  ┌────────────────────┐  ┌──────────────────┐  │
//! │  │  UploadPipeline    │  │  DownloadPipeline  │  │ Connectivity     │  │
//! │  │                    │  │                    │  │ Monitor          │  │
//! │  │  pending → POST    │  │  GET since cursor  │  │                  │  │
//! │  │  ack whole batch   │  │  upsert, advance   │  │ GET /health      │  │
//! │  └─────────┬──────────┘  └─────────┬──────────┘  └──────────────────┘  │
//! │            │                       │                                    │
//! │            └───────────┬───────────┘                                    │
//! │                        ▼                                                │
//! │            ┌───────────────────────┐     ┌──────────────────────────┐  │
//! │            │ SyncTransport         │     │ Checkout (sale flow)     │  │
//! │            │ HttpTransport/reqwest │     │ Local Store + try_send   │  │
//! │            └───────────────────────┘     └──────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`orchestrator`] - `SyncOrchestrator`, status, trigger handle
//! - [`upload`] / [`download`] - the two pipelines
//! - [`connectivity`] - reachability tracking and `/health` probe
//! - [`transport`] - `SyncTransport` trait and the HTTP client
//! - [`checkout`] - cart to recorded sale
//! - [`config`] - `sync.toml` and `TILL_*` overrides
//! - [`error`] - `SyncError`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use till_sync::{ConnectivityMonitor, HttpTransport, SyncConfig, SyncOrchestrator};
//!
//! let config = SyncConfig::load_or_init(None)?;
//! let transport = Arc::new(HttpTransport::from_config(&config)?);
//! let monitor = Arc::new(ConnectivityMonitor::new());
//!
//! let orchestrator = SyncOrchestrator::from_config(&config, db, transport, monitor);
//! let report = orchestrator.run_cycle().await?;
//! println!("uploaded {} downloaded {}", report.uploaded, report.downloaded);
//! ```

pub mod checkout;
pub mod config;
pub mod connectivity;
pub mod download;
pub mod error;
pub mod orchestrator;
pub mod transport;
pub mod upload;

pub use checkout::Checkout;
pub use config::{ServerSettings, StorageSettings, SyncConfig, SyncSettings, TerminalConfig};
pub use connectivity::{ConnectivityEvent, ConnectivityMonitor};
pub use download::{DownloadPipeline, DownloadReport};
pub use error::{SyncError, SyncOperation, SyncResult};
pub use orchestrator::{
    CycleReport, NoOpEmitter, OrchestratorHandle, SyncEventEmitter, SyncOrchestrator, SyncState,
    SyncStatus, SyncTrigger, TriggerOutcome, SYNC_FAILED_BANNER,
};
pub use transport::{HttpTransport, SyncTransport, TransportError};
pub use upload::UploadPipeline;
