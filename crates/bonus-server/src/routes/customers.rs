//! Customer administration: registration, lookup, deactivation and the
//! audit ledger.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::require_customer_key;
use crate::error::AppError;
use crate::ledger::LedgerVerification;
use crate::models::{CustomerAccount, EntryReason, LedgerEntry};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCustomerRequest {
    pub customer_key: Option<String>,
}

/// Public view of a customer account.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub customer_key: String,
    pub balance: i64,
    pub lifetime_orders: i64,
    pub active: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CustomerAccount> for AccountView {
    fn from(account: CustomerAccount) -> Self {
        Self {
            customer_key: account.customer_key,
            balance: account.balance,
            lifetime_orders: account.lifetime_orders,
            active: account.active,
            version: account.version,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntryView {
    pub seq: i64,
    pub order_id: Option<Uuid>,
    pub reason: EntryReason,
    pub delta: i64,
    pub balance_after: i64,
    pub created_at: DateTime<Utc>,
}

impl From<LedgerEntry> for LedgerEntryView {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            seq: entry.seq,
            order_id: entry.order_id,
            reason: entry.reason,
            delta: entry.delta,
            balance_after: entry.balance_after,
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LedgerResponse {
    pub entries: Vec<LedgerEntryView>,
}

/// Creates the customers router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(register_customer))
        .route("/{customer_key}", get(get_customer))
        .route("/{customer_key}/deactivate", post(deactivate_customer))
        .route("/{customer_key}/ledger", get(get_ledger))
        .route("/{customer_key}/ledger/verify", get(verify_ledger))
        .with_state(state)
}

/// POST /api/v1/customers
async fn register_customer(
    State(state): State<AppState>,
    body: Result<Json<RegisterCustomerRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AccountView>), AppError> {
    let Json(request) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let key = require_customer_key(request.customer_key.as_deref())?;

    let account = state.ledger.register_customer(&key).await?;
    Ok((StatusCode::CREATED, Json(account.into())))
}

/// GET /api/v1/customers/{customer_key}
async fn get_customer(
    State(state): State<AppState>,
    Path(customer_key): Path<String>,
) -> Result<Json<AccountView>, AppError> {
    let key = require_customer_key(Some(&customer_key))?;
    let account = state.ledger.account(&key).await?;
    Ok(Json(account.into()))
}

/// POST /api/v1/customers/{customer_key}/deactivate
async fn deactivate_customer(
    State(state): State<AppState>,
    Path(customer_key): Path<String>,
) -> Result<Json<AccountView>, AppError> {
    let key = require_customer_key(Some(&customer_key))?;
    let account = state.ledger.deactivate_customer(&key).await?;
    Ok(Json(account.into()))
}

/// GET /api/v1/customers/{customer_key}/ledger
async fn get_ledger(
    State(state): State<AppState>,
    Path(customer_key): Path<String>,
) -> Result<Json<LedgerResponse>, AppError> {
    let key = require_customer_key(Some(&customer_key))?;
    let entries = state.ledger.ledger_entries(&key).await?;
    Ok(Json(LedgerResponse {
        entries: entries.into_iter().map(LedgerEntryView::from).collect(),
    }))
}

/// GET /api/v1/customers/{customer_key}/ledger/verify
///
/// Replays the customer's ledger and reports whether it reproduces the
/// stored balance, with a digest of the replayed entries.
async fn verify_ledger(
    State(state): State<AppState>,
    Path(customer_key): Path<String>,
) -> Result<Json<LedgerVerification>, AppError> {
    let key = require_customer_key(Some(&customer_key))?;
    let report = state.ledger.verify_ledger(&key).await?;
    Ok(Json(report))
}
