//! Storage layer for customer balances, orders and the audit ledger.
//!
//! The only operation that mutates a balance is
//! [`BonusStore::commit_settlement`]. It is the atomic boundary of the whole
//! system: the balance compare-and-swap, the order record and the ledger
//! entries are written together or not at all.

pub mod memory;
pub mod postgres;
#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use bonus_core::CustomerKey;
use uuid::Uuid;

use crate::models::{CustomerAccount, LedgerEntry, NewLedgerEntry, NewOrder, Order};

pub use memory::MemoryBonusStore;
pub use postgres::PgBonusStore;

/// Errors raised by a store implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Customer already exists: {0}")]
    AlreadyExists(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),
}

impl StoreError {
    /// True for failures of the store itself rather than of the request.
    pub fn is_unavailable(&self) -> bool {
        match self {
            StoreError::Unavailable(_) => true,
            StoreError::Database(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::WorkerCrashed
            ),
            StoreError::AlreadyExists(_) | StoreError::ConstraintViolation(_) => false,
        }
    }
}

/// One atomic balance mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementCommit {
    pub customer_key: String,
    /// Version observed when the mutation was planned.
    pub expected_version: i64,
    pub new_balance: i64,
    /// Order settled by this mutation, if any.
    pub order: Option<NewOrder>,
    /// Ledger entries mirroring the balance change, in commit order.
    pub entries: Vec<NewLedgerEntry>,
}

/// Result of a compare-and-swap commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Everything was written; `account` is the post-commit state.
    Committed {
        account: CustomerAccount,
        order: Option<Order>,
    },
    /// The account changed (or was deactivated) since it was read.
    /// Nothing was written.
    VersionConflict,
}

/// Persistence for the bonus ledger.
#[async_trait]
pub trait BonusStore: Send + Sync {
    /// Loads an account by key.
    async fn fetch_account(&self, key: &CustomerKey) -> Result<Option<CustomerAccount>, StoreError>;

    /// Creates a zero-balance active account.
    async fn insert_account(&self, key: &CustomerKey) -> Result<CustomerAccount, StoreError>;

    /// Marks an account inactive and bumps its version.
    async fn deactivate_account(
        &self,
        key: &CustomerKey,
    ) -> Result<Option<CustomerAccount>, StoreError>;

    /// Applies a mutation if and only if the account is active and still at
    /// `expected_version`. A negative `new_balance` is rejected with
    /// [`StoreError::ConstraintViolation`] and nothing is written.
    async fn commit_settlement(&self, commit: &SettlementCommit)
        -> Result<CommitOutcome, StoreError>;

    /// Loads a settled order by id.
    async fn fetch_order(&self, id: Uuid) -> Result<Option<Order>, StoreError>;

    /// Completed orders for a customer, most recent first, ties broken by
    /// commit order.
    async fn list_orders(&self, key: &CustomerKey, limit: i64) -> Result<Vec<Order>, StoreError>;

    /// A customer's ledger entries in commit order.
    async fn ledger_entries(&self, key: &CustomerKey) -> Result<Vec<LedgerEntry>, StoreError>;
}
