//! # Local Store Handle
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Who shares the pool                              │
//! │                                                                         │
//! │   Checkout ─────────── record_sale ──────────────┐                      │
//! │   UploadPipeline ───── list_pending / ack ───────┤                      │
//! │   DownloadPipeline ─── upsert_many / advance ────┼──► SqlitePool (WAL)  │
//! │   till CLI ─────────── search / report ──────────┘        │             │
//! │                                                            ▼             │
//! │                                                       till.db            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each component holds its own clone of [`Database`]; there is no global.
//! WAL lets the sale flow write while a sync cycle reads, and `busy_timeout`
//! absorbs the short write-write overlap between a sale and an acknowledge.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::migrations::{self, SchemaStatus};
use crate::repository::cursor::CursorRepository;
use crate::repository::product::ProductRepository;
use crate::repository::transaction::TransactionRepository;

const MEMORY_PATH: &str = ":memory:";

/// How to open the Local Store.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_path: PathBuf,

    /// A terminal has a handful of concurrent tasks at most.
    pub max_connections: u32,

    /// How long an operation waits for a free connection.
    pub acquire_timeout: Duration,

    /// How long SQLite waits on a locked database before `SQLITE_BUSY`.
    pub busy_timeout: Duration,

    pub run_migrations: bool,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 4,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// Isolated, empty store for tests.
    ///
    /// Every connection to `:memory:` is a separate database, so the pool is
    /// pinned to one connection.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            ..DbConfig::new(MEMORY_PATH)
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == MEMORY_PATH
    }

    fn connect_options(&self) -> StorageResult<SqliteConnectOptions> {
        let options = if self.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&self.database_path)
                .create_if_missing(true)
        };

        Ok(options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(self.busy_timeout)
            .foreign_keys(true))
    }
}

/// Handle to the Local Store. Cloning shares the pool.
///
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./till.db")).await?;
/// let hits = db.products().search(DEFAULT_TENANT_ID, "cola", 20).await?;
/// let pending = db.transactions().count_pending(DEFAULT_TENANT_ID).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the database and brings its schema up to
    /// date unless `run_migrations` is off.
    pub async fn new(config: DbConfig) -> StorageResult<Self> {
        info!(path = %config.database_path.display(), "Opening Local Store");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(config.connect_options()?)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!(max_connections = config.max_connections, "Pool ready");

        let db = Database { pool };
        if config.run_migrations {
            db.run_migrations().await?;
        }
        Ok(db)
    }

    pub async fn run_migrations(&self) -> StorageResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    pub async fn schema_status(&self) -> StorageResult<SchemaStatus> {
        migrations::schema_status(&self.pool).await
    }

    /// Raw pool, for queries no repository covers.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    pub fn transactions(&self) -> TransactionRepository {
        TransactionRepository::new(self.pool.clone())
    }

    pub fn cursor(&self) -> CursorRepository {
        CursorRepository::new(self.pool.clone())
    }

    /// Closes the pool. Later operations fail with
    /// `StorageError::ConnectionFailed`.
    pub async fn close(&self) {
        debug!("Closing Local Store");
        self.pool.close().await;
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
