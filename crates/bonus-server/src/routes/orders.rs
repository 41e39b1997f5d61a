//! Storefront order endpoints: balance lookup, order placement and history.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    routing::get,
    Json, Router,
};
use bonus_core::{BonusError, LineItem};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Number;
use uuid::Uuid;

use super::require_customer_key;
use crate::error::AppError;
use crate::intake::PlaceOrder;
use crate::models::Order;
use crate::state::AppState;

/// Query for the balance endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceQuery {
    pub customer_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub balance: i64,
}

/// Request body for placing an order.
///
/// Numeric fields are taken as raw JSON numbers so that fractional or
/// out-of-range values are reported as `InvalidAmount` instead of a generic
/// parse failure.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub customer_key: Option<String>,
    pub line_items: Option<Vec<LineItemRequest>>,
    /// Defaults to 0.
    #[serde(default)]
    pub bonus_to_spend: Option<Number>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemRequest {
    pub product_id: Option<String>,
    pub quantity: Option<Number>,
    pub unit_price: Option<Number>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderResponse {
    pub order_id: Uuid,
    pub new_balance: i64,
    pub bonus_earned: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersQuery {
    pub customer_key: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub order_id: Uuid,
    pub amount: i64,
    pub bonus_earned: i64,
    pub bonus_used: i64,
    pub created_at: DateTime<Utc>,
}

impl From<Order> for OrderSummary {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.id,
            amount: order.amount,
            bonus_earned: order.bonus_earned,
            bonus_used: order.bonus_used,
            created_at: order.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListOrdersResponse {
    pub orders: Vec<OrderSummary>,
}

/// Creates the orders router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_orders).post(place_order))
        .route("/balance", get(get_balance))
        .with_state(state)
}

/// Reads an integer field, rejecting fractions and values outside `i64`.
fn integer_field(field: &str, value: &Number) -> Result<i64, BonusError> {
    value.as_i64().ok_or_else(|| {
        BonusError::InvalidAmount(format!("{} must be an integer, got {}", field, value))
    })
}

/// Turns the wire request into a validated [`PlaceOrder`].
fn parse_place_order(request: PlaceOrderRequest) -> Result<PlaceOrder, AppError> {
    let customer_key = require_customer_key(request.customer_key.as_deref())?;

    let line_items = request
        .line_items
        .ok_or_else(|| AppError::BadRequest("lineItems is required".to_string()))?
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let product_id = item.product_id.ok_or_else(|| {
                AppError::BadRequest(format!("lineItems[{}].productId is required", index))
            })?;
            let quantity = item.quantity.ok_or_else(|| {
                AppError::BadRequest(format!("lineItems[{}].quantity is required", index))
            })?;
            let unit_price = item.unit_price.ok_or_else(|| {
                AppError::BadRequest(format!("lineItems[{}].unitPrice is required", index))
            })?;
            Ok(LineItem::new(
                product_id,
                integer_field("quantity", &quantity)?,
                integer_field("unitPrice", &unit_price)?,
            ))
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    let bonus_to_spend = match &request.bonus_to_spend {
        Some(value) => integer_field("bonusToSpend", value)?,
        None => 0,
    };

    Ok(PlaceOrder {
        customer_key,
        line_items,
        bonus_to_spend,
    })
}

/// GET /api/v1/orders/balance?customerKey=...
async fn get_balance(
    State(state): State<AppState>,
    query: Result<Query<BalanceQuery>, QueryRejection>,
) -> Result<Json<BalanceResponse>, AppError> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let key = require_customer_key(query.customer_key.as_deref())?;

    let balance = state.ledger.balance(&key).await?;
    Ok(Json(BalanceResponse { balance }))
}

/// POST /api/v1/orders
///
/// Validates the order, applies the bonus spend and earn atomically and
/// records the order as completed.
async fn place_order(
    State(state): State<AppState>,
    body: Result<Json<PlaceOrderRequest>, JsonRejection>,
) -> Result<Json<PlaceOrderResponse>, AppError> {
    let Json(request) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let order = parse_place_order(request)?;

    let receipt = state.intake.place_order(order).await?;
    Ok(Json(PlaceOrderResponse {
        order_id: receipt.order_id,
        new_balance: receipt.new_balance,
        bonus_earned: receipt.bonus_earned,
    }))
}

/// GET /api/v1/orders?customerKey=...&limit=...
async fn list_orders(
    State(state): State<AppState>,
    query: Result<Query<ListOrdersQuery>, QueryRejection>,
) -> Result<Json<ListOrdersResponse>, AppError> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let key = require_customer_key(query.customer_key.as_deref())?;

    let orders = state.intake.list_orders(&key, query.limit).await?;
    Ok(Json(ListOrdersResponse {
        orders: orders.into_iter().map(OrderSummary::from).collect(),
    }))
}
