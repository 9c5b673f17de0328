//! # Till Terminal
//!
//! Headless POS terminal. Sales are written to the local SQLite store first
//! and reach the sync server whenever it is reachable.
//!
//! ## Application Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Till Terminal                                  │
//! │                                                                         │
//! │  main.rs ─────► logging, argument parsing, dispatch                     │
//! │                                                                         │
//! │  cli.rs ──────► clap definitions (sell, search, scan, sync, ...)        │
//! │                                                                         │
//! │  context.rs ──► SyncConfig + Local Store, opened once per invocation    │
//! │                                                                         │
//! │  commands/ ───► sale, product, sync                                     │
//! │                                 │                                       │
//! │                                 ▼                                       │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                         SQLite Database                          │  │
//! │  │  till.db (local file, WAL mode)                                  │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Startup Sequence
//! 1. Initialize tracing (`RUST_LOG` wins over the default filter)
//! 2. Parse arguments
//! 3. Load `sync.toml` + `TILL_*` overrides, then CLI overrides
//! 4. Open the database & run migrations
//! 5. Run the subcommand

mod cli;
mod commands;
mod context;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use context::TerminalContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,till=debug,sqlx=warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = TerminalContext::open(&cli.overrides()).await?;

    let result = match cli.command {
        Commands::Sell {
            items,
            payment,
            cashier,
            no_sync,
        } => commands::sale::sell(&ctx, &items, payment.into(), cashier, no_sync, cli.json).await,
        Commands::Search { query, limit } => {
            commands::product::search(&ctx, &query, limit, cli.json).await
        }
        Commands::Scan { sku } => commands::product::scan(&ctx, &sku, cli.json).await,
        Commands::Report { cashier } => commands::sale::report(&ctx, cashier, cli.json).await,
        Commands::Sync => commands::sync::sync_once(&ctx, cli.json).await,
        Commands::Status => commands::sync::status(&ctx, cli.json).await,
        Commands::ResetCursor => commands::sync::reset_cursor(&ctx).await,
        Commands::Run => commands::sync::run(&ctx).await,
    };

    ctx.close().await;
    result
}
