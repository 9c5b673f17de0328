//! Health check endpoint.
//!
//! Terminals probe this to decide whether they are online, so it must stay
//! cheap and never touch the catalog lock.

use std::sync::Arc;

use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use till_core::protocol::HEALTH_PATH;

use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(HEALTH_PATH, get(health))
}

async fn health() -> impl IntoResponse {
    "OK"
}
