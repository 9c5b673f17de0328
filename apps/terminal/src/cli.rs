use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand, ValueEnum};

use till_core::{PaymentMethod, DEFAULT_SEARCH_LIMIT, MAX_ITEM_QUANTITY};

#[derive(Parser)]
#[command(name = "till")]
#[command(about = "Offline-first point of sale terminal")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to the platform config dir's sync.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Sync server base URL
    #[arg(long, global = true, value_name = "URL")]
    pub server: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            config_path: self.config.clone(),
            db_path: self.db_path.clone(),
            server_url: self.server.clone(),
        }
    }
}

/// Command-line settings that win over the config file and environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_path: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub server_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record a sale
    Sell {
        /// Item to sell as SKU or SKU:QTY (repeatable)
        #[arg(long = "sku", value_name = "SKU[:QTY]", required = true)]
        items: Vec<SaleItemArg>,
        /// Payment method
        #[arg(long, value_enum, default_value_t = PaymentArg::Cash)]
        payment: PaymentArg,
        /// Cashier to stamp on the sale (defaults to the configured one)
        #[arg(long)]
        cashier: Option<String>,
        /// Skip the sync attempt after the sale
        #[arg(long)]
        no_sync: bool,
    },
    /// Search products by SKU or name prefix
    Search {
        query: String,
        /// Maximum results
        #[arg(short, long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: u32,
    },
    /// Look up a product by scan code
    Scan { sku: String },
    /// Run one sync cycle now
    Sync,
    /// Show sync status
    Status,
    /// End-of-day summary for a cashier
    Report {
        #[arg(long)]
        cashier: Option<String>,
    },
    /// Forget the download cursor so the next sync pulls the full catalog
    ResetCursor,
    /// Stay running: probe connectivity and sync in the background
    Run,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum PaymentArg {
    Cash,
    Card,
}

impl From<PaymentArg> for PaymentMethod {
    fn from(arg: PaymentArg) -> Self {
        match arg {
            PaymentArg::Cash => PaymentMethod::Cash,
            PaymentArg::Card => PaymentMethod::Card,
        }
    }
}

/// One `--sku` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleItemArg {
    pub sku: String,
    pub quantity: i64,
}

impl FromStr for SaleItemArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (sku, quantity) = match s.rsplit_once(':') {
            Some((sku, qty)) => {
                let qty: i64 = qty
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid quantity in '{s}'"))?;
                (sku, qty)
            }
            None => (s, 1),
        };

        let sku = sku.trim();
        if sku.is_empty() {
            return Err("SKU must not be empty".to_string());
        }
        if !(1..=MAX_ITEM_QUANTITY).contains(&quantity) {
            return Err(format!(
                "quantity must be between 1 and {MAX_ITEM_QUANTITY}, got {quantity}"
            ));
        }

        Ok(SaleItemArg {
            sku: sku.to_string(),
            quantity,
        })
    }
}

impl fmt::Display for SaleItemArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.sku, self.quantity)
    }
}
