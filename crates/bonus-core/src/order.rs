//! Order amount validation and settlement planning.
//!
//! Settlement happens in two phases. [`Quote::new`] performs every check
//! that depends only on the request (shape, amount, spend versus amount) and
//! can therefore run before any shared state is read. [`Quote::settle`] then
//! combines the quote with a balance snapshot; it must run inside the same
//! atomic unit that commits the result.

use serde::{Deserialize, Serialize};

use crate::balance::{BalanceDelta, BalanceState};
use crate::error::BonusError;
use crate::ledger::{ledger_lines, LedgerLine};
use crate::rate::EarnRate;

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Product reference from the catalog.
    pub product_id: String,
    /// Units ordered, strictly positive.
    pub quantity: i64,
    /// Price per unit in integer currency units, non-negative.
    pub unit_price: i64,
}

impl LineItem {
    pub fn new(product_id: impl Into<String>, quantity: i64, unit_price: i64) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            unit_price,
        }
    }

    /// `quantity × unit_price`, validated.
    pub fn subtotal(&self) -> Result<i64, BonusError> {
        if self.product_id.trim().is_empty() {
            return Err(BonusError::InvalidAmount(
                "line item is missing a product reference".to_string(),
            ));
        }
        if self.quantity <= 0 {
            return Err(BonusError::InvalidAmount(format!(
                "quantity for '{}' must be positive, got {}",
                self.product_id, self.quantity
            )));
        }
        if self.unit_price < 0 {
            return Err(BonusError::InvalidAmount(format!(
                "unit price for '{}' must not be negative, got {}",
                self.product_id, self.unit_price
            )));
        }
        self.quantity.checked_mul(self.unit_price).ok_or_else(|| {
            BonusError::InvalidAmount(format!("subtotal for '{}' overflows", self.product_id))
        })
    }
}

/// Sums the line items into the order total.
pub fn order_amount(items: &[LineItem]) -> Result<i64, BonusError> {
    if items.is_empty() {
        return Err(BonusError::InvalidAmount(
            "order must contain at least one line item".to_string(),
        ));
    }

    let mut total: i64 = 0;
    for item in items {
        total = total
            .checked_add(item.subtotal()?)
            .ok_or_else(|| BonusError::InvalidAmount("order total overflows".to_string()))?;
    }

    if total <= 0 {
        return Err(BonusError::InvalidAmount(format!(
            "order total must be positive, got {}",
            total
        )));
    }
    Ok(total)
}

/// An order that passed every state-independent check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    amount: i64,
    bonus_to_spend: i64,
}

impl Quote {
    /// Validates an order request.
    ///
    /// `max_bonus_per_order` is the optional per-order usage limit; `None`
    /// means only the order total bounds the spend.
    pub fn new(
        items: &[LineItem],
        bonus_to_spend: i64,
        max_bonus_per_order: Option<i64>,
    ) -> Result<Self, BonusError> {
        if bonus_to_spend < 0 {
            return Err(BonusError::InvalidAmount(format!(
                "bonus to spend must not be negative, got {}",
                bonus_to_spend
            )));
        }

        let amount = order_amount(items)?;

        if bonus_to_spend > amount {
            return Err(BonusError::BonusExceedsAmount {
                requested: bonus_to_spend,
                allowed: amount,
            });
        }
        if let Some(limit) = max_bonus_per_order {
            if bonus_to_spend > limit {
                return Err(BonusError::BonusExceedsAmount {
                    requested: bonus_to_spend,
                    allowed: limit,
                });
            }
        }

        Ok(Self {
            amount,
            bonus_to_spend,
        })
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn bonus_to_spend(&self) -> i64 {
        self.bonus_to_spend
    }

    /// Settles the quote against a balance snapshot.
    ///
    /// Earned bonus is computed on the payable amount (total minus the bonus
    /// applied), never on the gross total.
    pub fn settle(&self, state: BalanceState, rate: EarnRate) -> Result<Settlement, BonusError> {
        if self.bonus_to_spend > state.balance {
            return Err(BonusError::InsufficientBalance {
                requested: self.bonus_to_spend,
                available: state.balance,
            });
        }

        let payable = self.amount - self.bonus_to_spend;
        let bonus_earned = rate.earned_on(payable)?;
        let delta = BalanceDelta::new(bonus_earned, self.bonus_to_spend)?;
        let after = state.apply(delta)?;

        Ok(Settlement {
            amount: self.amount,
            bonus_used: self.bonus_to_spend,
            payable,
            bonus_earned,
            before: state,
            after,
        })
    }
}

/// The fully computed outcome of an order, ready to be committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub amount: i64,
    pub bonus_used: i64,
    pub payable: i64,
    pub bonus_earned: i64,
    pub before: BalanceState,
    pub after: BalanceState,
}

impl Settlement {
    pub fn delta(&self) -> BalanceDelta {
        BalanceDelta {
            earned: self.bonus_earned,
            spent: self.bonus_used,
        }
    }

    /// Ledger lines mirroring this settlement.
    pub fn ledger_lines(&self) -> Vec<LedgerLine> {
        ledger_lines(self.before.balance, self.delta())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerReason;

    fn items(amount: i64) -> Vec<LineItem> {
        vec![LineItem::new("latte", 1, amount)]
    }

    #[test]
    fn test_order_amount_sums_lines() {
        let lines = vec![
            LineItem::new("espresso", 2, 250),
            LineItem::new("croissant", 1, 500),
            LineItem::new("water", 3, 0),
        ];
        assert_eq!(order_amount(&lines).unwrap(), 1000);
    }

    #[test]
    fn test_order_amount_rejects_empty() {
        assert!(matches!(
            order_amount(&[]),
            Err(BonusError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_order_amount_rejects_bad_lines() {
        assert!(order_amount(&[LineItem::new("tea", 0, 100)]).is_err());
        assert!(order_amount(&[LineItem::new("tea", -1, 100)]).is_err());
        assert!(order_amount(&[LineItem::new("tea", 1, -100)]).is_err());
        assert!(order_amount(&[LineItem::new("  ", 1, 100)]).is_err());
    }

    #[test]
    fn test_order_amount_rejects_zero_total() {
        assert!(matches!(
            order_amount(&[LineItem::new("free-sample", 2, 0)]),
            Err(BonusError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_order_amount_rejects_overflow() {
        assert!(order_amount(&[LineItem::new("gold", i64::MAX, 2)]).is_err());

        let lines = vec![LineItem::new("a", 1, i64::MAX), LineItem::new("b", 1, 1)];
        assert!(order_amount(&lines).is_err());
    }

    #[test]
    fn test_quote_rejects_negative_spend() {
        assert!(matches!(
            Quote::new(&items(100), -1, None),
            Err(BonusError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_quote_rejects_spend_above_amount() {
        assert_eq!(
            Quote::new(&items(100), 101, None),
            Err(BonusError::BonusExceedsAmount {
                requested: 101,
                allowed: 100
            })
        );
    }

    #[test]
    fn test_quote_honors_usage_limit() {
        assert_eq!(
            Quote::new(&items(1000), 300, Some(200)),
            Err(BonusError::BonusExceedsAmount {
                requested: 300,
                allowed: 200
            })
        );
        assert!(Quote::new(&items(1000), 200, Some(200)).is_ok());
    }

    #[test]
    fn test_settle_earns_on_payable() {
        let quote = Quote::new(&items(1000), 50, None).unwrap();
        let settlement = quote
            .settle(BalanceState::new(50, 7), EarnRate::default())
            .unwrap();
        assert_eq!(settlement.payable, 950);
        assert_eq!(settlement.bonus_earned, 47);
        assert_eq!(settlement.after, BalanceState::new(47, 8));
    }

    #[test]
    fn test_settle_full_spend_earns_nothing() {
        let quote = Quote::new(&items(300), 300, None).unwrap();
        let settlement = quote
            .settle(BalanceState::new(500, 0), EarnRate::default())
            .unwrap();
        assert_eq!(settlement.payable, 0);
        assert_eq!(settlement.bonus_earned, 0);
        assert_eq!(settlement.after.balance, 200);

        let lines = settlement.ledger_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].reason, LedgerReason::Spent);
    }

    #[test]
    fn test_settle_insufficient_balance() {
        let quote = Quote::new(&items(1000), 101, None).unwrap();
        assert_eq!(
            quote.settle(BalanceState::new(100, 0), EarnRate::default()),
            Err(BonusError::InsufficientBalance {
                requested: 101,
                available: 100
            })
        );
    }
}
