//! Order model for settled storefront orders.

use bonus_core::{LineItem, Settlement};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Possible states of an order.
///
/// Orders are written with `Completed` in the same atomic unit as the balance
/// mutation; `Pending` and `Failed` are never persisted by the synchronous
/// settlement path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Accepted but not yet settled.
    Pending,
    /// Settled: balance mutated and ledger written.
    Completed,
    /// Rejected before settlement.
    Failed,
}

/// A settled order. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub customer_key: String,
    /// Sum of `quantity × unit_price` over the line items.
    pub amount: i64,
    /// Bonus redeemed against this order.
    pub bonus_used: i64,
    /// `amount - bonus_used`, the base for earning.
    pub payable_amount: i64,
    /// Bonus credited for this order.
    pub bonus_earned: i64,
    /// Customer balance right after this order committed.
    pub balance_after: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// A stored line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct OrderLineItem {
    pub order_id: Uuid,
    pub position: i32,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: i64,
}

/// Data required to persist a new order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub id: Uuid,
    pub customer_key: String,
    pub line_items: Vec<LineItem>,
    pub amount: i64,
    pub bonus_used: i64,
    pub payable_amount: i64,
    pub bonus_earned: i64,
    pub balance_after: i64,
}

impl NewOrder {
    /// Builds the order record for a computed settlement.
    pub fn from_settlement(
        id: Uuid,
        customer_key: &str,
        line_items: &[LineItem],
        settlement: &Settlement,
    ) -> Self {
        Self {
            id,
            customer_key: customer_key.to_string(),
            line_items: line_items.to_vec(),
            amount: settlement.amount,
            bonus_used: settlement.bonus_used,
            payable_amount: settlement.payable,
            bonus_earned: settlement.bonus_earned,
            balance_after: settlement.after.balance,
        }
    }

    /// Line items with their stored positions.
    pub fn stored_line_items(&self) -> Vec<OrderLineItem> {
        self.line_items
            .iter()
            .enumerate()
            .map(|(position, item)| OrderLineItem {
                order_id: self.id,
                position: position as i32,
                product_id: item.product_id.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect()
    }

    /// The committed record, stamped with `created_at`.
    pub fn into_order(self, created_at: DateTime<Utc>) -> Order {
        Order {
            id: self.id,
            customer_key: self.customer_key,
            amount: self.amount,
            bonus_used: self.bonus_used,
            payable_amount: self.payable_amount,
            bonus_earned: self.bonus_earned,
            balance_after: self.balance_after,
            status: OrderStatus::Completed,
            created_at,
        }
    }
}
