//! HTTP handlers.
//!
//! Each module owns one slice of the API and exposes a `routes()` builder.

pub mod health_service;
pub mod stock_service;
pub mod sync_service;
