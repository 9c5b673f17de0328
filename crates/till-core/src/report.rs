//! End-of-day reconciliation figures for a cashier's drawer.

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{PaymentMethod, Transaction};

/// Totals for one cashier over one shift.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndOfDaySummary {
    pub total_sales: Money,
    pub cash_sales: Money,
    pub card_sales: Money,
    pub transaction_count: usize,
    /// Transactions not yet acknowledged by the server.
    pub pending_count: usize,
}

impl EndOfDaySummary {
    /// Folds a set of transactions into a summary.
    ///
    /// Callers pick the window (usually [`start_of_local_day`] onward) and
    /// the cashier; this only adds up what it is given.
    pub fn from_transactions<'a, I>(transactions: I) -> Self
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        transactions
            .into_iter()
            .fold(EndOfDaySummary::default(), |mut acc, tx| {
                acc.total_sales += tx.total;
                acc.transaction_count += 1;
                match tx.payment_method {
                    PaymentMethod::Cash => acc.cash_sales += tx.total,
                    PaymentMethod::Card => acc.card_sales += tx.total,
                }
                if tx.is_pending() {
                    acc.pending_count += 1;
                }
                acc
            })
    }
}

/// Midnight of the current local day, as UTC.
pub fn start_of_local_day() -> DateTime<Utc> {
    let now = Local::now();
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| Local.from_local_datetime(&midnight).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        // midnight skipped by a DST jump; fall back to now
        .unwrap_or_else(|| now.with_timezone(&Utc))
}
