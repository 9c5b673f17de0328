//! Everything a command needs, opened once per invocation.

use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info};

use till_db::{Database, DbConfig};
use till_sync::{ConnectivityMonitor, HttpTransport, SyncConfig, SyncOrchestrator, SyncTransport};

use crate::cli::Overrides;

pub struct TerminalContext {
    pub config: SyncConfig,
    pub db: Database,
}

impl TerminalContext {
    /// Loads config (defaults, file, `TILL_*`, then `overrides`) and opens
    /// the Local Store. On first run this writes `sync.toml` with a fresh
    /// terminal id and creates the database directory.
    pub async fn open(overrides: &Overrides) -> anyhow::Result<Self> {
        let config = load_config(overrides)?;

        let db_path = config.database_path()?;
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let db = Database::new(DbConfig::new(db_path.clone()))
            .await
            .with_context(|| format!("opening {}", db_path.display()))?;

        info!(
            terminal = %config.terminal.name,
            tenant = %config.tenant_id(),
            "Terminal ready"
        );

        Ok(TerminalContext { config, db })
    }

    pub fn tenant_id(&self) -> &str {
        self.config.tenant_id()
    }

    pub fn transport(&self) -> anyhow::Result<Arc<HttpTransport>> {
        Ok(Arc::new(HttpTransport::from_config(&self.config)?))
    }

    /// Transport, monitor and orchestrator wired together. The monitor
    /// starts offline; callers probe before syncing.
    pub fn sync_stack(&self) -> anyhow::Result<SyncStack> {
        let transport = self.transport()?;
        let monitor = Arc::new(ConnectivityMonitor::new());
        let orchestrator = SyncOrchestrator::from_config(
            &self.config,
            self.db.clone(),
            transport.clone(),
            monitor.clone(),
        );

        Ok(SyncStack {
            transport,
            monitor,
            orchestrator,
        })
    }

    pub async fn close(&self) {
        self.db.close().await;
    }
}

pub struct SyncStack {
    pub transport: Arc<HttpTransport>,
    pub monitor: Arc<ConnectivityMonitor>,
    pub orchestrator: SyncOrchestrator,
}

impl SyncStack {
    /// Probes the server once and records the result on the monitor.
    pub async fn probe(&self, config: &SyncConfig) -> bool {
        let transport: &dyn SyncTransport = self.transport.as_ref();
        let online = self.monitor.probe_once(transport, config.request_timeout()).await;
        debug!(online, server = %self.transport.base_url(), "Probe finished");
        online
    }
}

fn load_config(overrides: &Overrides) -> anyhow::Result<SyncConfig> {
    let mut config = SyncConfig::load_or_init(overrides.config_path.clone())
        .context("loading sync config")?;

    if let Some(path) = &overrides.db_path {
        config.storage.database_path = Some(path.clone());
    }
    if let Some(url) = &overrides.server_url {
        config.server.url = url.clone();
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}
