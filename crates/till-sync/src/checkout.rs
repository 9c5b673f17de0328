//! # Checkout
//!
//! The register's sale flow: look products up, build a cart, record the sale.
//!
//! ## Sale Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   scan(sku) / search(q)          Local Store only, never the network   │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   Cart  (till-core)                                                     │
//! │        │                                                                │
//! │        ▼ complete_sale(payment)                                         │
//! │   1. freeze totals, validate                                           │
//! │   2. record_sale  ── Err ──► cart kept, error returned                  │
//! │   3. clear cart                                                         │
//! │   4. SyncTrigger::notify()  (try_send, fire-and-forget)                 │
//! │                                                                         │
//! │   Works identically online and offline.                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tracing::{debug, info};

use till_core::report::start_of_local_day;
use till_core::validation::{validate_search_query, validate_transaction};
use till_core::{
    Cart, CartTotals, CoreError, EndOfDaySummary, PaymentMethod, Product, Transaction,
    DEFAULT_SEARCH_LIMIT,
};
use till_db::Database;

use crate::error::SyncResult;
use crate::orchestrator::SyncTrigger;

/// One cashier's register session.
pub struct Checkout {
    db: Database,
    tenant_id: String,
    cashier_id: String,
    cart: Cart,
    trigger: Option<SyncTrigger>,
}

impl Checkout {
    pub fn new(db: Database, tenant_id: impl Into<String>, cashier_id: impl Into<String>) -> Self {
        Checkout {
            db,
            tenant_id: tenant_id.into(),
            cashier_id: cashier_id.into(),
            cart: Cart::new(),
            trigger: None,
        }
    }

    /// Requests a sync cycle after every recorded sale.
    pub fn with_trigger(mut self, trigger: SyncTrigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn cart_mut(&mut self) -> &mut Cart {
        &mut self.cart
    }

    pub fn totals(&self) -> CartTotals {
        self.cart.totals()
    }

    /// Exact SKU lookup without touching the cart.
    pub async fn lookup(&self, sku: &str) -> SyncResult<Option<Product>> {
        Ok(self.db.products().get_by_sku(&self.tenant_id, sku.trim()).await?)
    }

    /// Barcode scan: exact SKU match, added to the cart.
    pub async fn scan(&mut self, sku: &str, quantity: i64) -> SyncResult<Product> {
        let product = self
            .lookup(sku)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(sku.to_string()))?;

        self.cart.add_item(&product, quantity)?;
        debug!(sku = %product.sku, quantity, "Scanned");
        Ok(product)
    }

    pub async fn search(&self, query: &str) -> SyncResult<Vec<Product>> {
        self.search_with_limit(query, DEFAULT_SEARCH_LIMIT).await
    }

    pub async fn search_with_limit(&self, query: &str, limit: u32) -> SyncResult<Vec<Product>> {
        let query = validate_search_query(query).map_err(CoreError::from)?;
        Ok(self
            .db
            .products()
            .search(&self.tenant_id, &query, limit)
            .await?)
    }

    /// Records the cart as a pending transaction.
    ///
    /// The cart is cleared only once the write is committed. A storage
    /// failure returns `Err` with the cart intact so the cashier can retry.
    pub async fn complete_sale(&mut self, payment_method: PaymentMethod) -> SyncResult<Transaction> {
        if self.cart.is_empty() {
            return Err(CoreError::EmptyTransaction.into());
        }

        let sale = self
            .cart
            .to_transaction(&self.tenant_id, payment_method, &self.cashier_id)?;
        validate_transaction(&sale).map_err(CoreError::from)?;

        self.db.transactions().record_sale(&sale).await?;
        self.cart.clear();

        info!(
            id = %sale.id,
            total = %sale.total,
            payment = %sale.payment_method,
            "Sale completed"
        );

        if let Some(trigger) = &self.trigger {
            trigger.notify();
        }

        Ok(sale)
    }

    /// This cashier's totals since local midnight.
    pub async fn end_of_day(&self) -> SyncResult<EndOfDaySummary> {
        Ok(self
            .db
            .transactions()
            .end_of_day_summary(&self.tenant_id, &self.cashier_id, start_of_local_day())
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use chrono::{TimeZone, Utc};
    use till_core::{Money, SyncFlag, TaxRate, DEFAULT_TENANT_ID};
    use till_db::DbConfig;

    fn product(id: &str, sku: &str, name: &str, cents: i64) -> Product {
        Product {
            id: id.to_string(),
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            sku: sku.to_string(),
            name: name.to_string(),
            category: None,
            price: Money::from_cents(cents),
            stock: 10,
            tax_rate: TaxRate::from_bps(1000),
            updated_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
            pending_deduction: 0,
        }
    }

    async fn setup() -> (Database, Checkout) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products()
            .upsert_many(&[
                product("p1", "WIDGET-1", "Widget", 1000),
                product("p2", "COKE-330", "Coca-Cola 330ml", 250),
            ])
            .await
            .unwrap();
        let checkout = Checkout::new(db.clone(), DEFAULT_TENANT_ID, "cashier-1");
        (db, checkout)
    }

    #[tokio::test]
    async fn test_cart_math_scenario() {
        let (db, mut checkout) = setup().await;

        checkout.scan("WIDGET-1", 2).await.unwrap();
        checkout.scan("COKE-330", 2).await.unwrap();
        // 20.00 + 5.00 at 10%
        let totals = checkout.totals();
        assert_eq!(totals.subtotal.cents(), 2500);
        assert_eq!(totals.tax.cents(), 250);
        assert_eq!(totals.total.cents(), 2750);

        let sale = checkout.complete_sale(PaymentMethod::Cash).await.unwrap();

        assert_eq!(sale.total.cents(), 2750);
        assert_eq!(sale.sync_flag, SyncFlag::Pending);
        assert!(checkout.cart().is_empty());

        let stored = db.transactions().get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(stored, sale);

        let widget = db.products().get_by_id("p1").await.unwrap().unwrap();
        assert_eq!(widget.stock, 10);
        assert_eq!(widget.available_stock(), 8);
    }

    #[tokio::test]
    async fn test_unknown_sku_is_rejected() {
        let (_db, mut checkout) = setup().await;

        let err = checkout.scan("NOPE", 1).await.unwrap_err();

        assert!(matches!(err, SyncError::Sale(CoreError::ProductNotFound(_))));
        assert!(checkout.cart().is_empty());
    }

    #[tokio::test]
    async fn test_empty_cart_cannot_complete() {
        let (_db, mut checkout) = setup().await;

        let err = checkout.complete_sale(PaymentMethod::Card).await.unwrap_err();
        assert!(matches!(err, SyncError::Sale(CoreError::EmptyTransaction)));
    }

    #[tokio::test]
    async fn test_storage_failure_keeps_cart() {
        let (db, mut checkout) = setup().await;
        checkout.scan("COKE-330", 1).await.unwrap();

        db.close().await;
        let err = checkout.complete_sale(PaymentMethod::Cash).await.unwrap_err();

        assert!(matches!(err, SyncError::Storage(_)));
        assert_eq!(checkout.cart().item_count(), 1);
    }

    #[tokio::test]
    async fn test_sale_notifies_trigger() {
        let (_db, checkout) = setup().await;
        let (trigger, mut rx) = SyncTrigger::channel();
        let mut checkout = checkout.with_trigger(trigger);

        checkout.scan("COKE-330", 1).await.unwrap();
        checkout.complete_sale(PaymentMethod::Card).await.unwrap();
        checkout.scan("COKE-330", 1).await.unwrap();
        checkout.complete_sale(PaymentMethod::Card).await.unwrap();

        // requests coalesce in the bounded channel
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_search_and_end_of_day() {
        let (_db, mut checkout) = setup().await;

        let hits = checkout.search("coca").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(checkout.search("  ").await.unwrap().len(), 2);

        checkout.scan("WIDGET-1", 1).await.unwrap();
        checkout.complete_sale(PaymentMethod::Cash).await.unwrap();
        checkout.scan("COKE-330", 2).await.unwrap();
        checkout.complete_sale(PaymentMethod::Card).await.unwrap();

        let summary = checkout.end_of_day().await.unwrap();
        assert_eq!(summary.transaction_count, 2);
        assert_eq!(summary.cash_sales.cents(), 1100);
        assert_eq!(summary.card_sales.cents(), 550);
        assert_eq!(summary.total_sales.cents(), 1650);
        assert_eq!(summary.pending_count, 2);
    }
}
