//! # Terminal Commands
//!
//! ```text
//! commands/
//! ├── mod.rs      ◄─── You are here (exports)
//! ├── product.rs  ◄─── search, scan
//! ├── sale.rs     ◄─── sell, report
//! └── sync.rs     ◄─── sync, status, reset-cursor, run
//! ```
//!
//! Each command prints a human summary, or JSON with `--json`.

pub mod product;
pub mod sale;
pub mod sync;

use serde::Serialize;

pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
