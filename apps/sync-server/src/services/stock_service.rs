//! Back-office stock movements.
//!
//! Each movement bumps the product's `updatedAt`, which is how a correction
//! reaches terminals on their next download.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};

use till_core::protocol::{StockMovement, StockMovementRequest, STOCK_PATH};

use crate::error::ServerError;
use crate::{tenant_id, AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(STOCK_PATH, get(list_movements).post(create_movement))
}

async fn create_movement(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<StockMovementRequest>,
) -> Result<(StatusCode, Json<StockMovement>), ServerError> {
    let movement = state
        .store
        .record_movement(&tenant_id(&headers), request)
        .await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

async fn list_movements(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<Vec<StockMovement>> {
    Json(state.store.movements(&tenant_id(&headers)).await)
}
