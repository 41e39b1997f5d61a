//! API routes for the bonus server.

pub mod customers;
pub mod orders;

use axum::{routing::get, Json, Router};
use bonus_core::CustomerKey;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::state::AppState;

/// Creates the main API router with all routes mounted.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_v1_routes(state))
}

/// Creates the v1 API routes.
fn api_v1_routes(state: AppState) -> Router {
    Router::new()
        .nest("/orders", orders::router(state.clone()))
        .nest("/customers", customers::router(state))
}

/// GET /health
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Parses a customer key from a request, treating absence as a bad request.
pub(crate) fn require_customer_key(raw: Option<&str>) -> Result<CustomerKey, AppError> {
    let raw = raw.ok_or_else(|| AppError::BadRequest("customerKey is required".to_string()))?;
    Ok(CustomerKey::parse(raw)?)
}
