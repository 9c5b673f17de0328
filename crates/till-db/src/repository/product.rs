//! # Product Repository
//!
//! The terminal's copy of the server catalog.
//!
//! ## Stock Reconciliation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 stock vs pending_deduction                              │
//! │                                                                         │
//! │  Sale rung up (offline)                                                │
//! │       │  record_sale: pending_deduction += qty                         │
//! │       ▼                                                                 │
//! │  ┌───────────────────────────────┐                                     │
//! │  │ stock = 10  pending = 2       │  available_stock() = 8              │
//! │  └───────────────────────────────┘                                     │
//! │       │  upload succeeds, server applies: server stock = 8             │
//! │       │  (local row untouched until the download lands)                │
//! │       ▼                                                                 │
//! │  upsert_many([{stock: 8}])                                             │
//! │       │  stock := 8                                                     │
//! │       │  pending := Σ qty of STILL-PENDING sales for this product = 0  │
//! │       ▼                                                                 │
//! │  ┌───────────────────────────────┐                                     │
//! │  │ stock = 8   pending = 0       │  available_stock() = 8              │
//! │  └───────────────────────────────┘                                     │
//! │                                                                         │
//! │  Each sale is subtracted exactly once at every point in the cycle.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Search
//! `search` matches a case-insensitive name prefix OR an exact-case SKU
//! prefix, ordered by name. An empty query lists the catalog.

use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info};

use super::{decode_timestamp, encode_timestamp, like_prefix};
use crate::error::{StorageError, StorageResult};
use till_core::{Money, Product, TaxRate};

const SELECT_PRODUCT: &str = r#"
    SELECT id, tenant_id, sku, name, category, price_cents, stock,
           tax_rate_bps, updated_at, pending_deduction
    FROM products
"#;

/// Row shape of the `products` table.
#[derive(Debug, FromRow)]
struct ProductRow {
    id: String,
    tenant_id: String,
    sku: String,
    name: String,
    category: Option<String>,
    price_cents: i64,
    stock: i64,
    tax_rate_bps: i64,
    updated_at: String,
    pending_deduction: i64,
}

impl TryFrom<ProductRow> for Product {
    type Error = StorageError;

    fn try_from(row: ProductRow) -> StorageResult<Self> {
        let bps = u32::try_from(row.tax_rate_bps)
            .map_err(|e| StorageError::corrupt("products.tax_rate_bps", e))?;

        Ok(Product {
            id: row.id,
            tenant_id: row.tenant_id,
            sku: row.sku,
            name: row.name,
            category: row.category,
            price: Money::from_cents(row.price_cents),
            stock: row.stock,
            tax_rate: TaxRate::from_bps(bps),
            updated_at: decode_timestamp("products.updated_at", &row.updated_at)?,
            pending_deduction: row.pending_deduction,
        })
    }
}

fn into_products(rows: Vec<ProductRow>) -> StorageResult<Vec<Product>> {
    rows.into_iter().map(Product::try_from).collect()
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> StorageResult<Option<Product>> {
        let row: Option<ProductRow> = sqlx::query_as(&format!("{SELECT_PRODUCT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Product::try_from).transpose()
    }

    /// Exact SKU lookup (barcode scan).
    pub async fn get_by_sku(&self, tenant_id: &str, sku: &str) -> StorageResult<Option<Product>> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "{SELECT_PRODUCT} WHERE tenant_id = ?1 AND sku = ?2 ORDER BY updated_at DESC LIMIT 1"
        ))
        .bind(tenant_id)
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    /// Products whose SKU starts with `prefix` (case-sensitive).
    pub async fn search_by_sku_prefix(
        &self,
        tenant_id: &str,
        prefix: &str,
        limit: u32,
    ) -> StorageResult<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "{SELECT_PRODUCT} WHERE tenant_id = ?1 AND substr(sku, 1, ?2) = ?3 \
             ORDER BY sku LIMIT ?4"
        ))
        .bind(tenant_id)
        .bind(prefix.chars().count() as i64)
        .bind(prefix)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        into_products(rows)
    }

    /// Products whose name starts with `prefix`, ignoring ASCII case.
    pub async fn search_by_name_prefix(
        &self,
        tenant_id: &str,
        prefix: &str,
        limit: u32,
    ) -> StorageResult<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "{SELECT_PRODUCT} WHERE tenant_id = ?1 AND name LIKE ?2 ESCAPE '\\' \
             ORDER BY name COLLATE NOCASE LIMIT ?3"
        ))
        .bind(tenant_id)
        .bind(like_prefix(prefix))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        into_products(rows)
    }

    /// Register search: name prefix OR SKU prefix, ordered by name.
    pub async fn search(
        &self,
        tenant_id: &str,
        query: &str,
        limit: u32,
    ) -> StorageResult<Vec<Product>> {
        let query = query.trim();

        debug!(query = %query, limit = %limit, "Searching products");

        if query.is_empty() {
            let rows: Vec<ProductRow> = sqlx::query_as(&format!(
                "{SELECT_PRODUCT} WHERE tenant_id = ?1 ORDER BY name COLLATE NOCASE LIMIT ?2"
            ))
            .bind(tenant_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
            return into_products(rows);
        }

        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "{SELECT_PRODUCT} WHERE tenant_id = ?1 \
             AND (name LIKE ?2 ESCAPE '\\' OR substr(sku, 1, ?3) = ?4) \
             ORDER BY name COLLATE NOCASE LIMIT ?5"
        ))
        .bind(tenant_id)
        .bind(like_prefix(query))
        .bind(query.chars().count() as i64)
        .bind(query)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = rows.len(), "Search returned products");
        into_products(rows)
    }

    /// Whole catalog for a tenant, ordered by name.
    pub async fn list(&self, tenant_id: &str) -> StorageResult<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "{SELECT_PRODUCT} WHERE tenant_id = ?1 ORDER BY name COLLATE NOCASE"
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        into_products(rows)
    }

    pub async fn count(&self, tenant_id: &str) -> StorageResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE tenant_id = ?1")
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Bulk insert-or-replace by id, in ONE SQL transaction.
    ///
    /// The incoming record wins on every server-owned field. `pending_deduction`
    /// is recomputed from the transactions that are still pending, so sales
    /// the server already counted drop out of it and sales it has not seen
    /// stay in.
    ///
    /// Returns the number of products written. Either all are written or
    /// none are.
    pub async fn upsert_many(&self, products: &[Product]) -> StorageResult<usize> {
        if products.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;

        for product in products {
            sqlx::query(
                r#"
                INSERT INTO products (
                    id, tenant_id, sku, name, category, price_cents, stock,
                    tax_rate_bps, updated_at, pending_deduction
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0)
                ON CONFLICT(id) DO UPDATE SET
                    tenant_id    = excluded.tenant_id,
                    sku          = excluded.sku,
                    name         = excluded.name,
                    category     = excluded.category,
                    price_cents  = excluded.price_cents,
                    stock        = excluded.stock,
                    tax_rate_bps = excluded.tax_rate_bps,
                    updated_at   = excluded.updated_at
                "#,
            )
            .bind(&product.id)
            .bind(&product.tenant_id)
            .bind(&product.sku)
            .bind(&product.name)
            .bind(&product.category)
            .bind(product.price.cents())
            .bind(product.stock)
            .bind(i64::from(product.tax_rate.bps()))
            .bind(encode_timestamp(&product.updated_at))
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                UPDATE products SET pending_deduction = (
                    SELECT COALESCE(SUM(json_extract(line.value, '$.quantity')), 0)
                    FROM transactions t, json_each(t.items) AS line
                    WHERE t.sync_flag = 'pending'
                      AND t.tenant_id = products.tenant_id
                      AND json_extract(line.value, '$.productId') = products.id
                )
                WHERE id = ?1
                "#,
            )
            .bind(&product.id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(count = products.len(), "Upserted products");
        Ok(products.len())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};
    use chrono::{Duration, TimeZone, Utc};
    use till_core::{
        LineItem, Money, PaymentMethod, Product, TaxRate, Transaction, DEFAULT_TENANT_ID,
    };

    fn product(id: &str, sku: &str, name: &str, stock: i64) -> Product {
        Product {
            id: id.to_string(),
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            sku: sku.to_string(),
            name: name.to_string(),
            category: None,
            price: Money::from_cents(250),
            stock,
            tax_rate: TaxRate::from_bps(1000),
            updated_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
            pending_deduction: 0,
        }
    }

    fn sale_of(product_id: &str, quantity: i64) -> Transaction {
        let line = LineItem {
            product_id: product_id.to_string(),
            name: String::new(),
            price: Money::from_cents(250),
            quantity,
            tax: Money::from_cents(25),
            discount: Money::zero(),
        };
        Transaction::new(DEFAULT_TENANT_ID, vec![line], PaymentMethod::Cash, "c1").unwrap()
    }

    async fn seeded() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products()
            .upsert_many(&[
                product("p1", "COKE-330", "Coca-Cola 330ml", 24),
                product("p2", "COKE-500", "Coca-Cola 500ml", 12),
                product("p3", "WATER-1L", "Still Water 1L", 40),
                product("p4", "CHIPS-01", "crisps salted", 5),
            ])
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn test_get_by_id_and_sku() {
        let db = seeded().await;
        let repo = db.products();

        let p = repo.get_by_id("p3").await.unwrap().unwrap();
        assert_eq!(p.sku, "WATER-1L");
        assert_eq!(p.price.cents(), 250);
        assert_eq!(p.tax_rate.bps(), 1000);

        let by_sku = repo.get_by_sku(DEFAULT_TENANT_ID, "COKE-500").await.unwrap();
        assert_eq!(by_sku.unwrap().id, "p2");

        assert!(repo.get_by_id("missing").await.unwrap().is_none());
        assert!(repo.get_by_sku("other-tenant", "COKE-500").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_name_or_sku_prefix() {
        let db = seeded().await;
        let repo = db.products();

        let hits = repo.search(DEFAULT_TENANT_ID, "coca", 20).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].name, "Coca-Cola 330ml");

        let hits = repo.search(DEFAULT_TENANT_ID, "WATER", 20).await.unwrap();
        assert_eq!(hits.len(), 1);

        // case-insensitive on name
        let hits = repo.search(DEFAULT_TENANT_ID, "CRISPS", 20).await.unwrap();
        assert_eq!(hits.len(), 1);

        // prefix, not substring
        let hits = repo.search(DEFAULT_TENANT_ID, "Cola", 20).await.unwrap();
        assert!(hits.is_empty());

        let all = repo.search(DEFAULT_TENANT_ID, "  ", 2).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_prefix_searches() {
        let db = seeded().await;
        let repo = db.products();

        let skus = repo
            .search_by_sku_prefix(DEFAULT_TENANT_ID, "COKE", 20)
            .await
            .unwrap();
        assert_eq!(skus.len(), 2);

        let lower = repo
            .search_by_sku_prefix(DEFAULT_TENANT_ID, "coke", 20)
            .await
            .unwrap();
        assert!(lower.is_empty());

        let names = repo
            .search_by_name_prefix(DEFAULT_TENANT_ID, "still", 20)
            .await
            .unwrap();
        assert_eq!(names.len(), 1);

        // LIKE wildcards in input are literal
        let none = repo
            .search_by_name_prefix(DEFAULT_TENANT_ID, "%", 20)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_overwrites_record() {
        let db = seeded().await;
        let repo = db.products();

        let mut updated = product("p1", "COKE-330", "Coke Classic", 18);
        updated.price = Money::from_cents(300);
        updated.updated_at = updated.updated_at + Duration::hours(1);

        let written = repo.upsert_many(&[updated.clone()]).await.unwrap();
        assert_eq!(written, 1);

        let stored = repo.get_by_id("p1").await.unwrap().unwrap();
        assert_eq!(stored, updated);
        assert_eq!(repo.count(DEFAULT_TENANT_ID).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_upsert_empty_batch() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert_eq!(db.products().upsert_many(&[]).await.unwrap(), 0);
        assert_eq!(db.products().count(DEFAULT_TENANT_ID).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upsert_keeps_pending_sales_deducted() {
        let db = seeded().await;

        let sale = sale_of("p1", 3);
        db.transactions().record_sale(&sale).await.unwrap();

        let p1 = db.products().get_by_id("p1").await.unwrap().unwrap();
        assert_eq!(p1.stock, 24);
        assert_eq!(p1.available_stock(), 21);

        // server has not seen the sale yet: same stock comes back
        db.products()
            .upsert_many(&[product("p1", "COKE-330", "Coca-Cola 330ml", 24)])
            .await
            .unwrap();
        let p1 = db.products().get_by_id("p1").await.unwrap().unwrap();
        assert_eq!(p1.available_stock(), 21);

        // server applied the sale and the batch was acknowledged
        db.transactions()
            .mark_acknowledged(&[sale.id.clone()])
            .await
            .unwrap();
        db.products()
            .upsert_many(&[product("p1", "COKE-330", "Coca-Cola 330ml", 21)])
            .await
            .unwrap();
        let p1 = db.products().get_by_id("p1").await.unwrap().unwrap();
        assert_eq!(p1.pending_deduction, 0);
        assert_eq!(p1.available_stock(), 21);
    }

    #[tokio::test]
    async fn test_list_is_per_tenant() {
        let db = seeded().await;
        let mut foreign = product("x1", "COKE-330", "Other shop cola", 1);
        foreign.tenant_id = "tenant-b".to_string();
        db.products().upsert_many(&[foreign]).await.unwrap();

        assert_eq!(db.products().list(DEFAULT_TENANT_ID).await.unwrap().len(), 4);
        assert_eq!(db.products().list("tenant-b").await.unwrap().len(), 1);
    }
}
