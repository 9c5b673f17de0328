//! # Sync Commands
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Commands                                    │
//! │                                                                         │
//! │  sync          - probe, then one cycle (upload then download)          │
//! │  status        - pending count, cursor, reachability                   │
//! │  reset-cursor  - next download is a full catalog snapshot              │
//! │  run           - probe loop + orchestrator driver until Ctrl+C         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use till_sync::{SyncError, SyncStatus};

use super::print_json;
use crate::context::TerminalContext;

pub async fn sync_once(ctx: &TerminalContext, json: bool) -> anyhow::Result<()> {
    let stack = ctx.sync_stack()?;
    stack.probe(&ctx.config).await;

    let result = stack.orchestrator.run_cycle().await;
    let status = stack.orchestrator.status();

    match result {
        Ok(report) => {
            if json {
                print_json(&status)?;
            } else {
                println!(
                    "Synced: {} uploaded, {} products updated (cursor {})",
                    report.uploaded,
                    report.downloaded,
                    report.cursor.to_rfc3339()
                );
            }
            Ok(())
        }
        Err(SyncError::ConnectivityUnavailable) => {
            if json {
                print_json(&status)?;
            } else {
                println!(
                    "Offline: {} sale(s) waiting for {}",
                    status.pending_count,
                    stack.transport.base_url()
                );
            }
            Ok(())
        }
        Err(e) => {
            if json {
                print_json(&status)?;
            }
            Err(e.into())
        }
    }
}

/// One attempt after a sale. The sale is already committed, so failures
/// are logged and never returned.
pub async fn sync_after_sale(ctx: &TerminalContext) {
    let stack = match ctx.sync_stack() {
        Ok(stack) => stack,
        Err(e) => {
            warn!(error = %e, "Sync unavailable");
            return;
        }
    };

    if !stack.probe(&ctx.config).await {
        info!("Offline, sale will sync later");
        return;
    }

    match stack.orchestrator.run_cycle().await {
        Ok(report) => info!(
            uploaded = report.uploaded,
            downloaded = report.downloaded,
            "Synced after sale"
        ),
        Err(e) if e.is_skip() => info!(reason = %e, "Sync skipped"),
        Err(e) => warn!(error = %e, "Sync after sale failed, will retry later"),
    }
}

/// What `status` reports.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalStatus {
    pub terminal_id: String,
    pub terminal_name: String,
    pub tenant_id: String,
    pub server_url: String,
    pub online: bool,
    pub pending_count: i64,
    pub cursor: Option<DateTime<Utc>>,
}

pub async fn status(ctx: &TerminalContext, json: bool) -> anyhow::Result<()> {
    let stack = ctx.sync_stack()?;
    let online = stack.probe(&ctx.config).await;
    let pending_count = stack.orchestrator.refresh_pending().await?;
    let cursor = ctx.db.cursor().get(ctx.tenant_id()).await?;

    let status = TerminalStatus {
        terminal_id: ctx.config.terminal.id.clone(),
        terminal_name: ctx.config.terminal.name.clone(),
        tenant_id: ctx.tenant_id().to_string(),
        server_url: stack.transport.base_url().to_string(),
        online,
        pending_count,
        cursor,
    };

    if json {
        print_json(&status)
    } else {
        print!("{}", format_status(&status));
        Ok(())
    }
}

pub fn format_status(status: &TerminalStatus) -> String {
    let cursor = status
        .cursor
        .map(|c| c.to_rfc3339())
        .unwrap_or_else(|| "never synced".to_string());

    format!(
        "Terminal: {} ({})\n\
         Tenant:   {}\n\
         Server:   {} [{}]\n\
         Pending:  {}\n\
         Cursor:   {}\n",
        status.terminal_name,
        status.terminal_id,
        status.tenant_id,
        status.server_url,
        if status.online { "online" } else { "offline" },
        status.pending_count,
        cursor,
    )
}

pub async fn reset_cursor(ctx: &TerminalContext) -> anyhow::Result<()> {
    ctx.db.cursor().reset(ctx.tenant_id()).await?;
    println!("Cursor reset; next sync downloads the full catalog");
    Ok(())
}

/// Runs until Ctrl+C. Connectivity is probed on its own interval and the
/// orchestrator syncs on reconnect and on the sync interval.
pub async fn run(ctx: &TerminalContext) -> anyhow::Result<()> {
    if !ctx.config.sync.enabled {
        anyhow::bail!("Sync is disabled in config ([sync] enabled = false)");
    }

    let stack = ctx.sync_stack()?;
    let probe = stack.monitor.spawn_probe(
        stack.transport.clone(),
        ctx.config.probe_interval(),
        ctx.config.request_timeout(),
    );
    let driver = stack.orchestrator.spawn(ctx.config.sync_interval());

    info!(
        server = %stack.transport.base_url(),
        interval_secs = ctx.config.sync.interval_secs,
        "Terminal running, Ctrl+C to stop"
    );

    let mut status_rx = stack.orchestrator.subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                log_status(&status_rx.borrow_and_update());
            }
            signal = &mut ctrl_c => {
                if let Err(e) = signal {
                    warn!(error = %e, "Failed to listen for Ctrl+C");
                }
                break;
            }
        }
    }

    info!("Stopping");
    probe.abort();
    driver.shutdown().await;
    Ok(())
}

fn log_status(status: &SyncStatus) {
    if let Some(error) = &status.last_error {
        warn!(pending = status.pending_count, online = status.online, %error, "Sync status");
    } else {
        info!(
            pending = status.pending_count,
            online = status.online,
            state = ?status.state,
            "Sync status"
        );
    }
}
