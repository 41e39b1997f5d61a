//! Versioned bonus balance and its single state transition.

use serde::{Deserialize, Serialize};

use crate::error::BonusError;

/// A customer's balance together with the version used for compare-and-swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceState {
    /// Current bonus balance, never negative.
    pub balance: i64,
    /// Incremented by every committed mutation.
    pub version: i64,
}

/// Amounts credited and debited by one mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BalanceDelta {
    pub earned: i64,
    pub spent: i64,
}

impl BalanceDelta {
    /// Creates a delta, rejecting negative components.
    pub fn new(earned: i64, spent: i64) -> Result<Self, BonusError> {
        if earned < 0 {
            return Err(BonusError::InvalidAmount(format!(
                "earned delta must not be negative, got {}",
                earned
            )));
        }
        if spent < 0 {
            return Err(BonusError::InvalidAmount(format!(
                "spent delta must not be negative, got {}",
                spent
            )));
        }
        Ok(Self { earned, spent })
    }

    pub fn is_zero(&self) -> bool {
        self.earned == 0 && self.spent == 0
    }
}

impl BalanceState {
    pub fn new(balance: i64, version: i64) -> Self {
        Self { balance, version }
    }

    /// Applies a delta, producing the next state.
    ///
    /// The spend is checked against the balance *before* the earned amount is
    /// credited, so bonus earned by an order can never fund its own spend.
    pub fn apply(&self, delta: BalanceDelta) -> Result<BalanceState, BonusError> {
        let delta = BalanceDelta::new(delta.earned, delta.spent)?;
        if delta.spent > self.balance {
            return Err(BonusError::InsufficientBalance {
                requested: delta.spent,
                available: self.balance,
            });
        }
        let balance = (self.balance - delta.spent)
            .checked_add(delta.earned)
            .ok_or_else(|| BonusError::InvalidAmount("balance would overflow".to_string()))?;
        Ok(BalanceState {
            balance,
            version: self.version + 1,
        })
    }
}
