//! # Sale Commands
//!
//! ```text
//!  till sell --sku COKE-330:2 --sku CHIPS-SALT --payment card
//!        │
//!        ▼
//!  Checkout::scan (each item) ─► Checkout::complete_sale ─► receipt
//!        │                              │
//!        │                              └─ committed locally, pending sync
//!        ▼
//!  one sync attempt (unless --no-sync), failures only logged
//! ```

use anyhow::Context;

use till_core::{EndOfDaySummary, PaymentMethod, Transaction};
use till_sync::Checkout;

use super::print_json;
use crate::cli::SaleItemArg;
use crate::context::TerminalContext;

pub async fn sell(
    ctx: &TerminalContext,
    items: &[SaleItemArg],
    payment: PaymentMethod,
    cashier: Option<String>,
    no_sync: bool,
    json: bool,
) -> anyhow::Result<()> {
    let cashier = cashier.unwrap_or_else(|| ctx.config.terminal.cashier_id.clone());
    let mut checkout = Checkout::new(ctx.db.clone(), ctx.tenant_id(), cashier);

    for item in items {
        checkout
            .scan(&item.sku, item.quantity)
            .await
            .with_context(|| format!("adding {item}"))?;
    }

    let sale = checkout.complete_sale(payment).await?;

    if json {
        print_json(&sale)?;
    } else {
        print!("{}", format_receipt(&sale));
    }

    let config = &ctx.config.sync;
    if !no_sync && config.enabled && config.trigger_after_sale {
        super::sync::sync_after_sale(ctx).await;
    }

    Ok(())
}

pub async fn report(ctx: &TerminalContext, cashier: Option<String>, json: bool) -> anyhow::Result<()> {
    let cashier = cashier.unwrap_or_else(|| ctx.config.terminal.cashier_id.clone());
    let checkout = Checkout::new(ctx.db.clone(), ctx.tenant_id(), &cashier);
    let summary = checkout.end_of_day().await?;

    if json {
        print_json(&summary)
    } else {
        print!("{}", format_summary(&cashier, &summary));
        Ok(())
    }
}

pub fn format_receipt(sale: &Transaction) -> String {
    let mut out = String::new();
    for item in &sale.items {
        out.push_str(&format!(
            "{:<28} {:>3} x {:>8} {:>9}\n",
            item.name,
            item.quantity,
            item.price.to_string(),
            item.price.multiply_quantity(item.quantity).to_string()
        ));
    }
    out.push_str(&format!("{:<42} {:>9}\n", "Subtotal", sale.subtotal.to_string()));
    out.push_str(&format!("{:<42} {:>9}\n", "Tax", sale.tax.to_string()));
    out.push_str(&format!("{:<42} {:>9}\n", "Total", sale.total.to_string()));
    out.push_str(&format!("Paid by {} | sale {}\n", sale.payment_method, sale.id));
    out
}

pub fn format_summary(cashier: &str, summary: &EndOfDaySummary) -> String {
    format!(
        "End of day for {cashier}\n\
         Transactions: {}\n\
         Cash:         {}\n\
         Card:         {}\n\
         Total:        {}\n\
         Pending sync: {}\n",
        summary.transaction_count,
        summary.cash_sales,
        summary.card_sales,
        summary.total_sales,
        summary.pending_count,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use till_core::{Money, Product, TaxRate};
    use till_db::{Database, DbConfig};
    use till_sync::SyncConfig;

    async fn context() -> TerminalContext {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut config = SyncConfig::default();
        // nothing listens on the discard port
        config.server.url = "http://127.0.0.1:9".to_string();
        config.server.request_timeout_secs = 1;

        db.products()
            .upsert_many(&[Product {
                id: "p-coke".into(),
                tenant_id: config.tenant_id().to_string(),
                sku: "COKE-330".into(),
                name: "Coke 330ml".into(),
                category: None,
                price: Money::from_cents(1000),
                stock: 10,
                tax_rate: TaxRate::from_bps(1000),
                updated_at: Utc::now(),
                pending_deduction: 0,
            }])
            .await
            .unwrap();

        TerminalContext { config, db }
    }

    fn items(args: &[&str]) -> Vec<SaleItemArg> {
        args.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[tokio::test]
    async fn test_sell_records_pending_sale() {
        let ctx = context().await;

        sell(&ctx, &items(&["COKE-330:2"]), PaymentMethod::Cash, None, true, false)
            .await
            .unwrap();

        let tenant = ctx.tenant_id();
        assert_eq!(ctx.db.transactions().count_pending(tenant).await.unwrap(), 1);
        let coke = ctx.db.products().get_by_sku(tenant, "COKE-330").await.unwrap().unwrap();
        assert_eq!(coke.available_stock(), 8);
    }

    #[tokio::test]
    async fn test_sell_survives_unreachable_server() {
        let ctx = context().await;

        sell(&ctx, &items(&["COKE-330"]), PaymentMethod::Card, None, false, true)
            .await
            .unwrap();

        assert_eq!(
            ctx.db.transactions().count_pending(ctx.tenant_id()).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_unknown_sku_records_nothing() {
        let ctx = context().await;

        let err = sell(&ctx, &items(&["NOPE"]), PaymentMethod::Cash, None, true, false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("NOPE"));
        assert_eq!(
            ctx.db.transactions().count_pending(ctx.tenant_id()).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_receipt_and_summary_text() {
        let ctx = context().await;
        let mut checkout = Checkout::new(ctx.db.clone(), ctx.tenant_id(), "cashier-7");
        checkout.scan("COKE-330", 2).await.unwrap();
        let sale = checkout.complete_sale(PaymentMethod::Cash).await.unwrap();

        let receipt = format_receipt(&sale);
        assert!(receipt.contains("Coke 330ml"));
        assert!(receipt.contains("$22.00"));

        let summary = checkout.end_of_day().await.unwrap();
        let text = format_summary("cashier-7", &summary);
        assert!(text.contains("Transactions: 1"));
        assert!(text.contains("Pending sync: 1"));
    }
}
