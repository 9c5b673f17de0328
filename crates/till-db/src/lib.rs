//! # till-db: Local Store for Till POS
//!
//! Durable, crash-safe storage for the terminal: the product catalog, the
//! sales rung up on this terminal, and the sync cursor.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Till POS Data Flow                               │
//! │                                                                         │
//! │  Checkout::complete_sale      UploadPipeline      DownloadPipeline     │
//! │       │                            │                     │              │
//! │       ▼                            ▼                     ▼              │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     till-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────────┐  ┌────────────┐  │   │
//! │  │   │   Database    │    │   Repositories     │  │ Migrations │  │   │
//! │  │   │   (pool.rs)   │    │                    │  │ (embedded) │  │   │
//! │  │   │               │    │ ProductRepository  │  │            │  │   │
//! │  │   │ SqlitePool    │◄───│ TransactionRepo    │  │ 001_init   │  │   │
//! │  │   │ WAL mode      │    │ CursorRepository   │  │            │  │   │
//! │  │   └───────────────┘    └────────────────────┘  └────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   <data dir>/till.db                                            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - `StorageError`
//! - [`repository`] - Product, transaction and cursor repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use till_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("till.db")).await?;
//!
//! db.transactions().record_sale(&sale).await?;
//! let pending = db.transactions().list_pending(&tenant).await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{StorageError, StorageResult};
pub use migrations::SchemaStatus;
pub use pool::{Database, DbConfig};

pub use repository::cursor::CursorRepository;
pub use repository::product::ProductRepository;
pub use repository::transaction::TransactionRepository;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use till_core::{LineItem, Money, PaymentMethod, Transaction, DEFAULT_TENANT_ID};

    #[tokio::test]
    async fn test_state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("till.db");

        let line = LineItem {
            product_id: "p1".to_string(),
            name: "Coffee".to_string(),
            price: Money::from_cents(350),
            quantity: 2,
            tax: Money::from_cents(35),
            discount: Money::zero(),
        };
        let sale = Transaction::new(DEFAULT_TENANT_ID, vec![line], PaymentMethod::Cash, "c1")
            .unwrap();
        let watermark = Utc::now();

        {
            let db = Database::new(DbConfig::new(&path)).await.unwrap();
            db.transactions().record_sale(&sale).await.unwrap();
            db.cursor().advance(DEFAULT_TENANT_ID, watermark).await.unwrap();
            db.close().await;
        }

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        let pending = db.transactions().list_pending(DEFAULT_TENANT_ID).await.unwrap();
        assert_eq!(pending, vec![sale]);
        assert_eq!(
            db.cursor().get(DEFAULT_TENANT_ID).await.unwrap(),
            Some(watermark)
        );
    }
}
