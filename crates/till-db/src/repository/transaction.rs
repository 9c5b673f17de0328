//! # Transaction Repository
//!
//! Completed sales and their upload state.
//!
//! ## Lifecycle of a Row
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  record_sale(tx)                 ─── ONE SQL transaction ───            │
//! │    INSERT INTO transactions (sync_flag = 'pending')                     │
//! │    UPDATE products SET pending_deduction += qty   (per line)           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  list_pending()  ──► UploadPipeline ──► POST /sync/transactions         │
//! │       │                                        │                        │
//! │       │                      {success:true}    │   anything else        │
//! │       ▼                                        ▼                        │
//! │  mark_acknowledged(ids)               rows stay 'pending'              │
//! │    ONE SQL transaction, pending → acknowledged only                    │
//! │                                                                         │
//! │  Nothing but sync_flag ever changes after the INSERT.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info};

use super::{decode_timestamp, encode_timestamp};
use crate::error::{StorageError, StorageResult};
use till_core::{EndOfDaySummary, LineItem, Money, PaymentMethod, SyncFlag, Transaction};

const SELECT_TRANSACTION: &str = r#"
    SELECT id, tenant_id, items, subtotal_cents, tax_cents, total_cents,
           payment_method, timestamp, cashier_id, sync_flag
    FROM transactions
"#;

#[derive(Debug, FromRow)]
struct TransactionRow {
    id: String,
    tenant_id: String,
    items: String,
    subtotal_cents: i64,
    tax_cents: i64,
    total_cents: i64,
    payment_method: PaymentMethod,
    timestamp: String,
    cashier_id: String,
    sync_flag: SyncFlag,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = StorageError;

    fn try_from(row: TransactionRow) -> StorageResult<Self> {
        let items: Vec<LineItem> = serde_json::from_str(&row.items)
            .map_err(|e| StorageError::corrupt("transactions.items", e))?;

        Ok(Transaction {
            id: row.id,
            tenant_id: row.tenant_id,
            items,
            subtotal: Money::from_cents(row.subtotal_cents),
            tax: Money::from_cents(row.tax_cents),
            total: Money::from_cents(row.total_cents),
            payment_method: row.payment_method,
            timestamp: decode_timestamp("transactions.timestamp", &row.timestamp)?,
            cashier_id: row.cashier_id,
            sync_flag: row.sync_flag,
        })
    }
}

fn into_transactions(rows: Vec<TransactionRow>) -> StorageResult<Vec<Transaction>> {
    rows.into_iter().map(Transaction::try_from).collect()
}

/// Repository for completed sales.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    /// Persists a completed sale and reserves its stock, atomically.
    ///
    /// ## Errors
    /// - `UniqueViolation` if a transaction with this id already exists
    /// - any other `StorageError` if the write cannot be committed; in that
    ///   case nothing was written
    pub async fn record_sale(&self, sale: &Transaction) -> StorageResult<()> {
        let items = serde_json::to_string(&sale.items)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, tenant_id, items, subtotal_cents, tax_cents, total_cents,
                payment_method, timestamp, cashier_id, sync_flag
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.tenant_id)
        .bind(items)
        .bind(sale.subtotal.cents())
        .bind(sale.tax.cents())
        .bind(sale.total.cents())
        .bind(sale.payment_method)
        .bind(encode_timestamp(&sale.timestamp))
        .bind(&sale.cashier_id)
        .bind(sale.sync_flag)
        .execute(&mut *tx)
        .await?;

        if sale.is_pending() {
            for item in &sale.items {
                sqlx::query(
                    "UPDATE products SET pending_deduction = pending_deduction + ?1 WHERE id = ?2",
                )
                .bind(item.quantity)
                .bind(&item.product_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        info!(
            id = %sale.id,
            total = %sale.total,
            lines = sale.items.len(),
            "Recorded sale"
        );
        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> StorageResult<Option<Transaction>> {
        let row: Option<TransactionRow> =
            sqlx::query_as(&format!("{SELECT_TRANSACTION} WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Transaction::try_from).transpose()
    }

    /// Transactions awaiting upload, oldest first.
    pub async fn list_pending(&self, tenant_id: &str) -> StorageResult<Vec<Transaction>> {
        self.list_by_sync_flag(tenant_id, SyncFlag::Pending).await
    }

    pub async fn list_by_sync_flag(
        &self,
        tenant_id: &str,
        flag: SyncFlag,
    ) -> StorageResult<Vec<Transaction>> {
        let rows: Vec<TransactionRow> = sqlx::query_as(&format!(
            "{SELECT_TRANSACTION} WHERE tenant_id = ?1 AND sync_flag = ?2 ORDER BY timestamp, id"
        ))
        .bind(tenant_id)
        .bind(flag)
        .fetch_all(&self.pool)
        .await?;

        into_transactions(rows)
    }

    /// Transactions with `from <= timestamp < to`, oldest first.
    pub async fn list_in_range(
        &self,
        tenant_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StorageResult<Vec<Transaction>> {
        let rows: Vec<TransactionRow> = sqlx::query_as(&format!(
            "{SELECT_TRANSACTION} WHERE tenant_id = ?1 AND timestamp >= ?2 AND timestamp < ?3 \
             ORDER BY timestamp, id"
        ))
        .bind(tenant_id)
        .bind(encode_timestamp(&from))
        .bind(encode_timestamp(&to))
        .fetch_all(&self.pool)
        .await?;

        into_transactions(rows)
    }

    /// One cashier's transactions at or after `since`.
    pub async fn list_by_cashier(
        &self,
        tenant_id: &str,
        cashier_id: &str,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<Transaction>> {
        let rows: Vec<TransactionRow> = sqlx::query_as(&format!(
            "{SELECT_TRANSACTION} WHERE tenant_id = ?1 AND cashier_id = ?2 AND timestamp >= ?3 \
             ORDER BY timestamp, id"
        ))
        .bind(tenant_id)
        .bind(cashier_id)
        .bind(encode_timestamp(&since))
        .fetch_all(&self.pool)
        .await?;

        into_transactions(rows)
    }

    /// Flags a batch as acknowledged, in ONE SQL transaction.
    ///
    /// Only `pending` rows change; ids that are unknown or already
    /// acknowledged are skipped. Returns the number of rows changed.
    pub async fn mark_acknowledged(&self, ids: &[String]) -> StorageResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut changed = 0;

        for id in ids {
            let result = sqlx::query(
                "UPDATE transactions SET sync_flag = 'acknowledged' \
                 WHERE id = ?1 AND sync_flag = 'pending'",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
            changed += result.rows_affected();
        }

        tx.commit().await?;

        debug!(requested = ids.len(), changed, "Marked transactions acknowledged");
        Ok(changed)
    }

    pub async fn count_pending(&self, tenant_id: &str) -> StorageResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transactions WHERE tenant_id = ?1 AND sync_flag = 'pending'",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Drawer totals for one cashier since `since`.
    pub async fn end_of_day_summary(
        &self,
        tenant_id: &str,
        cashier_id: &str,
        since: DateTime<Utc>,
    ) -> StorageResult<EndOfDaySummary> {
        let transactions = self.list_by_cashier(tenant_id, cashier_id, since).await?;
        Ok(EndOfDaySummary::from_transactions(&transactions))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::error::StorageError;
    use crate::{Database, DbConfig};
    use chrono::{Duration, TimeZone, Utc};
    use till_core::{
        LineItem, Money, PaymentMethod, SyncFlag, Transaction, DEFAULT_TENANT_ID,
    };

    fn sale(cashier: &str, cents: i64, payment: PaymentMethod) -> Transaction {
        let line = LineItem {
            product_id: "p1".to_string(),
            name: "Item".to_string(),
            price: Money::from_cents(cents),
            quantity: 1,
            tax: Money::zero(),
            discount: Money::zero(),
        };
        Transaction::new(DEFAULT_TENANT_ID, vec![line], payment, cashier).unwrap()
    }

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_record_and_read_back() {
        let db = db().await;
        let repo = db.transactions();

        let mut tx = sale("c1", 1250, PaymentMethod::Card);
        tx.items[0].discount = Money::from_cents(50);
        tx.subtotal = Money::from_cents(1200);
        tx.total = Money::from_cents(1200);

        repo.record_sale(&tx).await.unwrap();

        let stored = repo.get_by_id(&tx.id).await.unwrap().unwrap();
        assert_eq!(stored, tx);
        assert_eq!(stored.sync_flag, SyncFlag::Pending);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let db = db().await;
        let tx = sale("c1", 100, PaymentMethod::Cash);

        db.transactions().record_sale(&tx).await.unwrap();
        let err = db.transactions().record_sale(&tx).await.unwrap_err();

        assert!(matches!(err, StorageError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_pending_listing_oldest_first() {
        let db = db().await;
        let repo = db.transactions();

        let mut newer = sale("c1", 100, PaymentMethod::Cash);
        let mut older = sale("c1", 200, PaymentMethod::Cash);
        older.timestamp = newer.timestamp - Duration::minutes(5);
        newer.timestamp = older.timestamp + Duration::minutes(1);

        repo.record_sale(&newer).await.unwrap();
        repo.record_sale(&older).await.unwrap();

        let pending = repo.list_pending(DEFAULT_TENANT_ID).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, older.id);
        assert_eq!(repo.count_pending(DEFAULT_TENANT_ID).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_mark_acknowledged_only_flips_pending() {
        let db = db().await;
        let repo = db.transactions();

        let a = sale("c1", 100, PaymentMethod::Cash);
        let b = sale("c1", 200, PaymentMethod::Cash);
        repo.record_sale(&a).await.unwrap();
        repo.record_sale(&b).await.unwrap();

        let changed = repo
            .mark_acknowledged(&[a.id.clone(), "unknown".to_string()])
            .await
            .unwrap();
        assert_eq!(changed, 1);

        // second time is a no-op
        let changed = repo.mark_acknowledged(&[a.id.clone()]).await.unwrap();
        assert_eq!(changed, 0);

        let acked = repo
            .list_by_sync_flag(DEFAULT_TENANT_ID, SyncFlag::Acknowledged)
            .await
            .unwrap();
        assert_eq!(acked.len(), 1);
        assert_eq!(acked[0].id, a.id);
        assert_eq!(repo.count_pending(DEFAULT_TENANT_ID).await.unwrap(), 1);

        assert_eq!(repo.mark_acknowledged(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_range_is_half_open() {
        let db = db().await;
        let repo = db.transactions();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();

        let mut at_start = sale("c1", 100, PaymentMethod::Cash);
        at_start.timestamp = t0;
        let mut at_end = sale("c1", 100, PaymentMethod::Cash);
        at_end.timestamp = t0 + Duration::hours(1);

        repo.record_sale(&at_start).await.unwrap();
        repo.record_sale(&at_end).await.unwrap();

        let hits = repo
            .list_in_range(DEFAULT_TENANT_ID, t0, t0 + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, at_start.id);
    }

    #[tokio::test]
    async fn test_end_of_day_summary_per_cashier() {
        let db = db().await;
        let repo = db.transactions();
        let since = Utc::now() - Duration::hours(1);

        repo.record_sale(&sale("c1", 1000, PaymentMethod::Cash)).await.unwrap();
        repo.record_sale(&sale("c1", 500, PaymentMethod::Card)).await.unwrap();
        repo.record_sale(&sale("c2", 9900, PaymentMethod::Cash)).await.unwrap();

        let mut yesterday = sale("c1", 7700, PaymentMethod::Cash);
        yesterday.timestamp = since - Duration::days(1);
        repo.record_sale(&yesterday).await.unwrap();

        let summary = repo
            .end_of_day_summary(DEFAULT_TENANT_ID, "c1", since)
            .await
            .unwrap();

        assert_eq!(summary.transaction_count, 2);
        assert_eq!(summary.total_sales.cents(), 1500);
        assert_eq!(summary.cash_sales.cents(), 1000);
        assert_eq!(summary.card_sales.cents(), 500);
        assert_eq!(summary.pending_count, 2);
    }
}
