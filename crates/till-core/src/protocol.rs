//! # Sync Protocol
//!
//! Request and response bodies exchanged between terminals and the sync
//! server. Both sides compile against these types, so the JSON contract
//! lives in exactly one place.
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Sync Protocol (JSON over HTTP)                     │
//! │                                                                         │
//! │  UPLOAD                                                                 │
//! │  ──────                                                                 │
//! │  Terminal ───► POST /sync/transactions  { transactions: [...] }        │
//! │  Server   ◄─── 200 { success: true }                                   │
//! │                                                                         │
//! │  DOWNLOAD                                                               │
//! │  ────────                                                               │
//! │  Terminal ───► GET /sync/products?lastSync=<RFC3339>  (param optional) │
//! │  Server   ◄─── 200 { products: [...], timestamp: <RFC3339> }           │
//! │                                                                         │
//! │  HEALTH                                                                 │
//! │  ──────                                                                 │
//! │  Terminal ───► GET /health                                             │
//! │  Server   ◄─── 200 OK                                                  │
//! │                                                                         │
//! │  STOCK (back office)                                                    │
//! │  ─────                                                                  │
//! │  Client   ───► POST /stock { productId, type, quantity, reason }       │
//! │  Server   ◄─── 201 StockMovement                                       │
//! │                                                                         │
//! │  Every request may carry `X-Tenant-Id`.                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Product, Transaction};

pub const UPLOAD_PATH: &str = "/sync/transactions";
pub const DOWNLOAD_PATH: &str = "/sync/products";
pub const HEALTH_PATH: &str = "/health";
pub const STOCK_PATH: &str = "/stock";

/// Header naming the tenant a request belongs to.
pub const TENANT_HEADER: &str = "X-Tenant-Id";

/// Query parameter carrying the download cursor.
pub const LAST_SYNC_PARAM: &str = "lastSync";

// =============================================================================
// Upload
// =============================================================================

/// Body of `POST /sync/transactions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRequest {
    pub transactions: Vec<Transaction>,
}

/// Reply to an upload.
///
/// Only `success` is part of the contract; the counts are informational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Transactions applied for the first time.
    #[serde(default)]
    pub applied: usize,

    /// Transactions the server had already applied.
    #[serde(default)]
    pub duplicates: usize,
}

// =============================================================================
// Download
// =============================================================================

/// Reply to `GET /sync/products`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadResponse {
    pub products: Vec<Product>,

    /// Server clock when the snapshot was taken; the next cursor.
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// Stock Movements
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockMovementKind {
    /// Goods received.
    In,
    /// Goods removed (damage, transfer).
    Out,
    /// Signed correction after a count.
    Adjustment,
}

impl StockMovementKind {
    /// Change to apply to stock for `quantity`.
    pub fn delta(&self, quantity: i64) -> i64 {
        match self {
            StockMovementKind::In => quantity,
            StockMovementKind::Out => -quantity,
            StockMovementKind::Adjustment => quantity,
        }
    }
}

/// Body of `POST /stock`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovementRequest {
    pub product_id: String,

    #[serde(rename = "type")]
    pub kind: StockMovementKind,

    pub quantity: i64,

    #[serde(default)]
    pub reason: String,
}

/// A recorded stock movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub id: String,
    pub tenant_id: String,
    pub product_id: String,
    pub product_name: String,

    #[serde(rename = "type")]
    pub kind: StockMovementKind,

    pub quantity: i64,
    pub reason: String,
    pub date: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_response_minimal_body() {
        let resp: UploadResponse = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(resp.success);
        assert_eq!(resp.applied, 0);
        assert!(resp.message.is_none());
    }

    #[test]
    fn test_download_response_parses_server_body() {
        let body = r#"{
            "products": [{
                "id": "p1", "sku": "COKE-330", "name": "Coca-Cola 330ml",
                "price": 2.5, "stock": 10, "taxRate": 0.1,
                "updatedAt": "2024-05-01T10:00:00.000Z"
            }],
            "timestamp": "2024-05-01T10:05:00.000Z"
        }"#;

        let resp: DownloadResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.products.len(), 1);
        assert_eq!(resp.products[0].price.cents(), 250);
        assert_eq!(resp.timestamp.to_rfc3339(), "2024-05-01T10:05:00+00:00");
    }

    #[test]
    fn test_stock_movement_wire_shape() {
        let req: StockMovementRequest = serde_json::from_str(
            r#"{"productId":"p1","type":"adjustment","quantity":-3,"reason":"recount"}"#,
        )
        .unwrap();

        assert_eq!(req.kind, StockMovementKind::Adjustment);
        assert_eq!(req.kind.delta(req.quantity), -3);
        assert_eq!(StockMovementKind::Out.delta(4), -4);
        assert_eq!(StockMovementKind::In.delta(4), 4);
    }
}
