//! Product lookup against the Local Store.

use anyhow::bail;
use serde::Serialize;

use till_core::Product;
use till_sync::Checkout;

use super::print_json;
use crate::context::TerminalContext;

/// Product as shown at the register.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRow {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub price: String,
    pub price_cents: i64,
    /// Server stock minus local sales not yet acknowledged.
    pub available: i64,
}

impl From<&Product> for ProductRow {
    fn from(p: &Product) -> Self {
        ProductRow {
            id: p.id.clone(),
            sku: p.sku.clone(),
            name: p.name.clone(),
            price: p.price.to_string(),
            price_cents: p.price.cents(),
            available: p.available_stock(),
        }
    }
}

pub fn format_row(row: &ProductRow) -> String {
    format!(
        "{:<14} {:<28} {:>9} {:>6} left",
        row.sku, row.name, row.price, row.available
    )
}

pub async fn search(ctx: &TerminalContext, query: &str, limit: u32, json: bool) -> anyhow::Result<()> {
    let checkout = Checkout::new(ctx.db.clone(), ctx.tenant_id(), &ctx.config.terminal.cashier_id);
    let rows: Vec<ProductRow> = checkout
        .search_with_limit(query, limit)
        .await?
        .iter()
        .map(ProductRow::from)
        .collect();

    if json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("No products match '{query}'");
    }
    for row in &rows {
        println!("{}", format_row(row));
    }
    Ok(())
}

pub async fn scan(ctx: &TerminalContext, sku: &str, json: bool) -> anyhow::Result<()> {
    let checkout = Checkout::new(ctx.db.clone(), ctx.tenant_id(), &ctx.config.terminal.cashier_id);
    let Some(product) = checkout.lookup(sku).await? else {
        bail!("Product not found: {sku}");
    };

    let row = ProductRow::from(&product);
    if json {
        print_json(&row)
    } else {
        println!("{}", format_row(&row));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use till_core::{Money, TaxRate, DEFAULT_TENANT_ID};

    #[test]
    fn test_row_shows_available_stock() {
        let product = Product {
            id: "p1".into(),
            tenant_id: DEFAULT_TENANT_ID.into(),
            sku: "COKE-330".into(),
            name: "Coke 330ml".into(),
            category: None,
            price: Money::from_cents(250),
            stock: 48,
            tax_rate: TaxRate::from_bps(1000),
            updated_at: Utc::now(),
            pending_deduction: 2,
        };

        let row = ProductRow::from(&product);
        assert_eq!(row.available, 46);
        assert_eq!(row.price, "$2.50");
        assert!(format_row(&row).contains("COKE-330"));
    }
}
