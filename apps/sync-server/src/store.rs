//! # Catalog Store
//!
//! Volatile, per-tenant server state.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CatalogStore  (tokio RwLock)                                          │
//! │                                                                         │
//! │   clock ── strictly increasing; every change and every snapshot ticks  │
//! │                                                                         │
//! │   tenants: tenant_id ─► TenantCatalog                                   │
//! │                           ├─ products   id ─► Product                   │
//! │                           ├─ applied    {transaction id}                │
//! │                           ├─ received   [Transaction]  (upload order)   │
//! │                           └─ movements  [StockMovement]                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Watermarks
//! A download snapshot and the `updatedAt` of every later change both come
//! from the same ticking clock under the same lock, so a change is always
//! strictly newer than any snapshot that did not include it.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use till_core::protocol::{DownloadResponse, StockMovement, StockMovementKind, StockMovementRequest};
use till_core::{Money, Product, TaxRate, Transaction, DEFAULT_TENANT_ID};

use crate::config::ConfigError;
use crate::error::ServerError;

/// What one upload did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub applied: usize,
    pub duplicates: usize,
}

#[derive(Debug, Default)]
struct TenantCatalog {
    products: HashMap<String, Product>,
    applied: HashSet<String>,
    received: Vec<Transaction>,
    movements: Vec<StockMovement>,
}

#[derive(Debug)]
struct Catalog {
    tenants: HashMap<String, TenantCatalog>,
    clock: DateTime<Utc>,
}

impl Catalog {
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        self.clock = if now > self.clock {
            now
        } else {
            self.clock + Duration::nanoseconds(1)
        };
        self.clock
    }

    fn tenant(&mut self, tenant_id: &str) -> &mut TenantCatalog {
        self.tenants.entry(tenant_id.to_string()).or_default()
    }
}

/// In-memory catalog shared by all request handlers.
#[derive(Debug)]
pub struct CatalogStore {
    inner: RwLock<Catalog>,
}

impl Default for CatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogStore {
    pub fn new() -> Self {
        CatalogStore {
            inner: RwLock::new(Catalog {
                tenants: HashMap::new(),
                clock: DateTime::<Utc>::MIN_UTC,
            }),
        }
    }

    /// Inserts or replaces products, stamping each with a fresh `updatedAt`.
    pub async fn seed(&self, products: Vec<Product>) -> usize {
        let mut catalog = self.inner.write().await;
        let count = products.len();

        for mut product in products {
            product.updated_at = catalog.tick();
            product.pending_deduction = 0;
            let tenant_id = product.tenant_id.clone();
            catalog
                .tenant(&tenant_id)
                .products
                .insert(product.id.clone(), product);
        }

        info!(count, "Catalog seeded");
        count
    }

    /// Applies uploaded sales, each at most once per transaction id.
    ///
    /// Every line decrements the product's stock and bumps its `updatedAt`.
    /// Lines for unknown products are logged and skipped; the transaction
    /// still counts as applied. Applied sales are kept, restamped with the
    /// uploading tenant, for [`CatalogStore::transactions`].
    pub async fn apply_transactions(
        &self,
        tenant_id: &str,
        transactions: &[Transaction],
    ) -> ApplyOutcome {
        let mut catalog = self.inner.write().await;
        let mut outcome = ApplyOutcome::default();

        for tx in transactions {
            if catalog.tenant(tenant_id).applied.contains(&tx.id) {
                debug!(id = %tx.id, "Duplicate transaction ignored");
                outcome.duplicates += 1;
                continue;
            }

            for item in &tx.items {
                let stamp = catalog.tick();
                match catalog.tenant(tenant_id).products.get_mut(&item.product_id) {
                    Some(product) => {
                        product.stock -= item.quantity;
                        product.updated_at = stamp;
                    }
                    None => warn!(
                        transaction = %tx.id,
                        product_id = %item.product_id,
                        "Sale line for unknown product"
                    ),
                }
            }

            let tenant = catalog.tenant(tenant_id);
            tenant.applied.insert(tx.id.clone());
            tenant.received.push(Transaction {
                tenant_id: tenant_id.to_string(),
                ..tx.clone()
            });
            outcome.applied += 1;
        }

        info!(
            tenant_id,
            applied = outcome.applied,
            duplicates = outcome.duplicates,
            "Transactions applied"
        );
        outcome
    }

    /// Products changed after `since` (all when `None`), oldest change first.
    pub async fn products_since(
        &self,
        tenant_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> DownloadResponse {
        // write lock: the snapshot itself ticks the clock
        let mut catalog = self.inner.write().await;
        let timestamp = catalog.tick();

        let mut products: Vec<Product> = catalog
            .tenant(tenant_id)
            .products
            .values()
            .filter(|p| since.map_or(true, |s| p.updated_at > s))
            .cloned()
            .collect();
        products.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then_with(|| a.id.cmp(&b.id)));

        debug!(tenant_id, count = products.len(), since = ?since, "Products snapshot");
        DownloadResponse {
            products,
            timestamp,
        }
    }

    pub async fn get_product(&self, tenant_id: &str, product_id: &str) -> Option<Product> {
        let catalog = self.inner.read().await;
        catalog
            .tenants
            .get(tenant_id)
            .and_then(|t| t.products.get(product_id))
            .cloned()
    }

    /// Sales applied for a tenant, in the order they were uploaded.
    pub async fn transactions(&self, tenant_id: &str) -> Vec<Transaction> {
        let catalog = self.inner.read().await;
        catalog
            .tenants
            .get(tenant_id)
            .map(|t| t.received.clone())
            .unwrap_or_default()
    }

    /// Records a back-office stock change.
    ///
    /// `in` adds, `out` subtracts, `adjustment` applies a signed delta.
    pub async fn record_movement(
        &self,
        tenant_id: &str,
        request: StockMovementRequest,
    ) -> Result<StockMovement, ServerError> {
        match request.kind {
            StockMovementKind::In | StockMovementKind::Out if request.quantity <= 0 => {
                return Err(ServerError::InvalidRequest(
                    "quantity must be positive".to_string(),
                ));
            }
            StockMovementKind::Adjustment if request.quantity == 0 => {
                return Err(ServerError::InvalidRequest(
                    "adjustment must not be zero".to_string(),
                ));
            }
            _ => {}
        }

        let mut catalog = self.inner.write().await;
        let date = catalog.tick();
        let tenant = catalog.tenant(tenant_id);

        let product = tenant
            .products
            .get_mut(&request.product_id)
            .ok_or_else(|| ServerError::NotFound(format!("product {}", request.product_id)))?;

        product.stock += request.kind.delta(request.quantity);
        product.updated_at = date;

        let movement = StockMovement {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            kind: request.kind,
            quantity: request.quantity,
            reason: request.reason,
            date,
        };

        info!(
            product_id = %movement.product_id,
            kind = ?movement.kind,
            quantity = movement.quantity,
            stock = product.stock,
            "Stock movement recorded"
        );

        tenant.movements.push(movement.clone());
        Ok(movement)
    }

    /// Movements for a tenant, newest first.
    pub async fn movements(&self, tenant_id: &str) -> Vec<StockMovement> {
        let catalog = self.inner.read().await;
        catalog
            .tenants
            .get(tenant_id)
            .map(|t| t.movements.iter().rev().cloned().collect())
            .unwrap_or_default()
    }
}

// =============================================================================
// Seeding
// =============================================================================

/// Seed file entry. `updatedAt` is assigned by the server.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedProduct {
    id: String,
    #[serde(default)]
    tenant_id: Option<String>,
    sku: String,
    name: String,
    #[serde(default)]
    category: Option<String>,
    price: Money,
    stock: i64,
    #[serde(default)]
    tax_rate: Option<TaxRate>,
}

impl From<SeedProduct> for Product {
    fn from(seed: SeedProduct) -> Self {
        Product {
            id: seed.id,
            tenant_id: seed
                .tenant_id
                .unwrap_or_else(|| DEFAULT_TENANT_ID.to_string()),
            sku: seed.sku,
            name: seed.name,
            category: seed.category,
            price: seed.price,
            stock: seed.stock,
            tax_rate: seed.tax_rate.unwrap_or(TaxRate::zero()),
            updated_at: Utc::now(),
            pending_deduction: 0,
        }
    }
}

/// Reads a JSON array of products.
pub fn load_seed_file(path: &Path) -> Result<Vec<Product>, ConfigError> {
    let seed_error = |reason: String| ConfigError::SeedFile {
        path: path.display().to_string(),
        reason,
    };

    let raw = std::fs::read_to_string(path).map_err(|e| seed_error(e.to_string()))?;
    let entries: Vec<SeedProduct> =
        serde_json::from_str(&raw).map_err(|e| seed_error(e.to_string()))?;

    Ok(entries.into_iter().map(Product::from).collect())
}

/// Small catalog for demos and manual testing.
pub fn demo_catalog() -> Vec<Product> {
    let entries = [
        ("demo-coke-330", "COKE-330", "Coca-Cola 330ml", "Drinks", 250, 48),
        ("demo-water-500", "WATER-500", "Still Water 500ml", "Drinks", 120, 60),
        ("demo-chips-salt", "CHIPS-SALT", "Salted Chips 150g", "Snacks", 325, 30),
        ("demo-choc-bar", "CHOC-BAR", "Chocolate Bar", "Snacks", 180, 40),
        ("demo-coffee-250", "COFFEE-250", "Ground Coffee 250g", "Pantry", 899, 12),
    ];

    entries
        .into_iter()
        .map(|(id, sku, name, category, cents, stock)| Product {
            id: id.to_string(),
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            sku: sku.to_string(),
            name: name.to_string(),
            category: Some(category.to_string()),
            price: Money::from_cents(cents),
            stock,
            tax_rate: TaxRate::from_bps(1000),
            updated_at: Utc::now(),
            pending_deduction: 0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use till_core::{LineItem, PaymentMethod};

    fn sale_of(product_id: &str, quantity: i64) -> Transaction {
        let line = LineItem {
            product_id: product_id.to_string(),
            name: String::new(),
            price: Money::from_cents(250),
            quantity,
            tax: Money::zero(),
            discount: Money::zero(),
        };
        Transaction::new(DEFAULT_TENANT_ID, vec![line], PaymentMethod::Cash, "c1").unwrap()
    }

    async fn seeded() -> CatalogStore {
        let store = CatalogStore::new();
        store.seed(demo_catalog()).await;
        store
    }

    #[tokio::test]
    async fn test_apply_is_idempotent() {
        let store = seeded().await;
        let tx = sale_of("demo-coke-330", 3);

        let first = store.apply_transactions(DEFAULT_TENANT_ID, &[tx.clone()]).await;
        let second = store
            .apply_transactions(DEFAULT_TENANT_ID, &[tx.clone(), tx])
            .await;

        assert_eq!(first, ApplyOutcome { applied: 1, duplicates: 0 });
        assert_eq!(second, ApplyOutcome { applied: 0, duplicates: 2 });

        let coke = store.get_product(DEFAULT_TENANT_ID, "demo-coke-330").await.unwrap();
        assert_eq!(coke.stock, 45);
        assert_eq!(store.transactions(DEFAULT_TENANT_ID).await.len(), 1);
    }

    #[tokio::test]
    async fn test_applied_transactions_are_kept_per_tenant() {
        let store = seeded().await;
        let first = sale_of("demo-coke-330", 1);
        let second = sale_of("demo-chips-salt", 2);

        store
            .apply_transactions(DEFAULT_TENANT_ID, &[first.clone(), second.clone()])
            .await;
        // a retried upload does not list the sale twice
        store.apply_transactions(DEFAULT_TENANT_ID, &[first.clone()]).await;
        store
            .apply_transactions("tenant-b", &[sale_of("demo-water-500", 1)])
            .await;

        let kept = store.transactions(DEFAULT_TENANT_ID).await;
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].id, first.id);
        assert_eq!(kept[1].id, second.id);
        assert_eq!(kept[1].items[0].quantity, 2);
        assert_eq!(kept[1].total, second.total);

        let other = store.transactions("tenant-b").await;
        assert_eq!(other.len(), 1);
        assert_eq!(other[0].tenant_id, "tenant-b");
        assert!(store.transactions("tenant-c").await.is_empty());
    }

    #[tokio::test]
    async fn test_sale_makes_product_visible_to_next_download() {
        let store = seeded().await;
        let snapshot = store.products_since(DEFAULT_TENANT_ID, None).await;
        assert_eq!(snapshot.products.len(), 5);

        let unchanged = store
            .products_since(DEFAULT_TENANT_ID, Some(snapshot.timestamp))
            .await;
        assert!(unchanged.products.is_empty());
        assert!(unchanged.timestamp > snapshot.timestamp);

        store
            .apply_transactions(DEFAULT_TENANT_ID, &[sale_of("demo-water-500", 2)])
            .await;
        let delta = store
            .products_since(DEFAULT_TENANT_ID, Some(unchanged.timestamp))
            .await;

        assert_eq!(delta.products.len(), 1);
        assert_eq!(delta.products[0].id, "demo-water-500");
        assert_eq!(delta.products[0].stock, 58);
    }

    #[tokio::test]
    async fn test_unknown_product_line_is_skipped() {
        let store = seeded().await;

        let outcome = store
            .apply_transactions(DEFAULT_TENANT_ID, &[sale_of("missing", 1)])
            .await;

        assert_eq!(outcome.applied, 1);
    }

    #[tokio::test]
    async fn test_stock_movements() {
        let store = seeded().await;
        let request = |kind, quantity| StockMovementRequest {
            product_id: "demo-coffee-250".to_string(),
            kind,
            quantity,
            reason: "count".to_string(),
        };

        store
            .record_movement(DEFAULT_TENANT_ID, request(StockMovementKind::In, 10))
            .await
            .unwrap();
        store
            .record_movement(DEFAULT_TENANT_ID, request(StockMovementKind::Out, 4))
            .await
            .unwrap();
        let last = store
            .record_movement(DEFAULT_TENANT_ID, request(StockMovementKind::Adjustment, -3))
            .await
            .unwrap();

        let coffee = store.get_product(DEFAULT_TENANT_ID, "demo-coffee-250").await.unwrap();
        assert_eq!(coffee.stock, 12 + 10 - 4 - 3);
        assert_eq!(coffee.updated_at, last.date);

        let history = store.movements(DEFAULT_TENANT_ID).await;
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].id, last.id);
    }

    #[tokio::test]
    async fn test_movement_validation() {
        let store = seeded().await;

        let err = store
            .record_movement(
                DEFAULT_TENANT_ID,
                StockMovementRequest {
                    product_id: "nope".to_string(),
                    kind: StockMovementKind::In,
                    quantity: 1,
                    reason: String::new(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::NotFound(_)));

        let err = store
            .record_movement(
                DEFAULT_TENANT_ID,
                StockMovementRequest {
                    product_id: "demo-coke-330".to_string(),
                    kind: StockMovementKind::Out,
                    quantity: -2,
                    reason: String::new(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_tenants_are_isolated() {
        let store = seeded().await;

        let other = store.products_since("tenant-b", None).await;

        assert!(other.products.is_empty());
    }

    #[test]
    fn test_seed_file_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"[{"id":"p1","sku":"A-1","name":"Apple","price":0.5,"stock":100,"taxRate":0.05}]"#,
        )
        .unwrap();

        let products = load_seed_file(&path).unwrap();

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].tenant_id, DEFAULT_TENANT_ID);
        assert_eq!(products[0].price.cents(), 50);
        assert_eq!(products[0].tax_rate.bps(), 500);
    }
}
