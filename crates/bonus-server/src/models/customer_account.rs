//! Customer account model holding the authoritative bonus balance.

use bonus_core::BalanceState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A customer's bonus account.
///
/// The balance is only ever changed through a compare-and-swap on `version`,
/// and accounts are never deleted, only deactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CustomerAccount {
    /// Stable external key (phone number or account id).
    pub customer_key: String,
    /// Current bonus balance, never negative.
    pub balance: i64,
    /// Compare-and-swap token, bumped by every mutation.
    pub version: i64,
    /// Number of completed orders.
    pub lifetime_orders: i64,
    /// Deactivated accounts keep their history but cannot transact.
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustomerAccount {
    /// Creates a fresh zero-balance account.
    pub fn new(customer_key: String, now: DateTime<Utc>) -> Self {
        Self {
            customer_key,
            balance: 0,
            version: 0,
            lifetime_orders: 0,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// The balance snapshot used to plan a mutation.
    pub fn state(&self) -> BalanceState {
        BalanceState::new(self.balance, self.version)
    }
}
