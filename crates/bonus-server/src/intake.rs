//! Order intake: validates an order, settles it against the bonus ledger and
//! records it, all or nothing.

use bonus_core::{BonusError, CustomerKey, EarnRate, LineItem, Quote};
use uuid::Uuid;

use crate::config::LedgerSettings;
use crate::error::AppError;
use crate::ledger::BonusLedger;
use crate::models::{NewLedgerEntry, NewOrder, Order};
use crate::store::SettlementCommit;

/// Orders returned by history queries when no limit is given.
pub const DEFAULT_ORDER_LIMIT: i64 = 20;
/// Largest page of order history.
pub const MAX_ORDER_LIMIT: i64 = 100;

/// A validated order request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceOrder {
    pub customer_key: CustomerKey,
    pub line_items: Vec<LineItem>,
    pub bonus_to_spend: i64,
}

/// Outcome of a settled order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReceipt {
    pub order_id: Uuid,
    pub amount: i64,
    pub bonus_used: i64,
    pub bonus_earned: i64,
    pub new_balance: i64,
}

#[derive(Clone)]
pub struct OrderIntakeService {
    ledger: BonusLedger,
    earn_rate: EarnRate,
    max_bonus_per_order: Option<i64>,
}

impl OrderIntakeService {
    pub fn new(ledger: BonusLedger, settings: &LedgerSettings) -> Self {
        Self {
            ledger,
            earn_rate: settings.earn_rate,
            max_bonus_per_order: settings.max_bonus_per_order,
        }
    }

    pub fn earn_rate(&self) -> EarnRate {
        self.earn_rate
    }

    /// Settles an order.
    ///
    /// Request-only checks run before any store access. The balance check,
    /// the earn computation and the writes then happen inside one
    /// compare-and-swap commit, so a rejected or failed order leaves neither
    /// an order record nor a balance change behind.
    pub async fn place_order(&self, request: PlaceOrder) -> Result<OrderReceipt, AppError> {
        let quote = Quote::new(
            &request.line_items,
            request.bonus_to_spend,
            self.max_bonus_per_order,
        )?;

        // One id per call, reused across retries of the commit.
        let order_id = Uuid::new_v4();
        let key = &request.customer_key;

        let applied = self
            .ledger
            .settle(key, |account| {
                let settlement = quote.settle(account.state(), self.earn_rate)?;
                Ok(SettlementCommit {
                    customer_key: account.customer_key.clone(),
                    expected_version: account.version,
                    new_balance: settlement.after.balance,
                    order: Some(NewOrder::from_settlement(
                        order_id,
                        &account.customer_key,
                        &request.line_items,
                        &settlement,
                    )),
                    entries: NewLedgerEntry::from_lines(
                        &account.customer_key,
                        Some(order_id),
                        &settlement.ledger_lines(),
                    ),
                })
            })
            .await
            .map_err(|e| {
                if let AppError::Bonus(BonusError::InsufficientBalance {
                    requested,
                    available,
                }) = &e
                {
                    tracing::info!(
                        customer_key = %key,
                        requested,
                        available,
                        "Order rejected, insufficient bonus balance"
                    );
                }
                e
            })?;

        let order = applied.order.ok_or_else(|| {
            AppError::Internal(format!("order {} committed without an order record", order_id))
        })?;

        tracing::info!(
            customer_key = %key,
            order_id = %order.id,
            amount = order.amount,
            bonus_used = order.bonus_used,
            bonus_earned = order.bonus_earned,
            new_balance = applied.balance,
            attempts = applied.attempts,
            "Order settled"
        );

        Ok(OrderReceipt {
            order_id: order.id,
            amount: order.amount,
            bonus_used: order.bonus_used,
            bonus_earned: order.bonus_earned,
            new_balance: applied.balance,
        })
    }

    /// Completed orders, most recent first. `limit` defaults to
    /// [`DEFAULT_ORDER_LIMIT`] and is clamped to `1..=MAX_ORDER_LIMIT`.
    pub async fn list_orders(
        &self,
        key: &CustomerKey,
        limit: Option<i64>,
    ) -> Result<Vec<Order>, AppError> {
        self.ledger.orders(key, clamp_limit(limit)).await
    }
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit
        .unwrap_or(DEFAULT_ORDER_LIMIT)
        .clamp(1, MAX_ORDER_LIMIT)
}
