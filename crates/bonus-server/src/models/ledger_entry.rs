//! Append-only bonus ledger entries, the audit mirror of every balance change.

use bonus_core::{LedgerLine, LedgerReason};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Stored form of [`LedgerReason`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "ledger_reason", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntryReason {
    Earned,
    Spent,
}

impl From<LedgerReason> for EntryReason {
    fn from(reason: LedgerReason) -> Self {
        match reason {
            LedgerReason::Earned => EntryReason::Earned,
            LedgerReason::Spent => EntryReason::Spent,
        }
    }
}

impl From<EntryReason> for LedgerReason {
    fn from(reason: EntryReason) -> Self {
        match reason {
            EntryReason::Earned => LedgerReason::Earned,
            EntryReason::Spent => LedgerReason::Spent,
        }
    }
}

/// An immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LedgerEntry {
    pub id: Uuid,
    /// Global commit order.
    pub seq: i64,
    pub customer_key: String,
    /// Order that caused this entry, if any.
    pub order_id: Option<Uuid>,
    pub reason: EntryReason,
    /// Signed change: negative when spent, positive when earned.
    pub delta: i64,
    /// Running balance after this entry.
    pub balance_after: i64,
    pub created_at: DateTime<Utc>,
}

/// Data required to append a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub id: Uuid,
    pub customer_key: String,
    pub order_id: Option<Uuid>,
    pub reason: EntryReason,
    pub delta: i64,
    pub balance_after: i64,
}

impl NewLedgerEntry {
    /// Converts planned ledger lines into entries for one customer.
    pub fn from_lines(customer_key: &str, order_id: Option<Uuid>, lines: &[LedgerLine]) -> Vec<Self> {
        lines
            .iter()
            .map(|line| Self {
                id: Uuid::new_v4(),
                customer_key: customer_key.to_string(),
                order_id,
                reason: line.reason.into(),
                delta: line.delta,
                balance_after: line.balance_after,
            })
            .collect()
    }

    pub fn into_entry(self, seq: i64, created_at: DateTime<Utc>) -> LedgerEntry {
        LedgerEntry {
            id: self.id,
            seq,
            customer_key: self.customer_key,
            order_id: self.order_id,
            reason: self.reason,
            delta: self.delta,
            balance_after: self.balance_after,
            created_at,
        }
    }
}
