//! Store wrappers shared by unit tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bonus_core::CustomerKey;
use uuid::Uuid;

use super::{BonusStore, CommitOutcome, MemoryBonusStore, SettlementCommit, StoreError};
use crate::models::{CustomerAccount, LedgerEntry, Order};

/// Store whose commits stall for `delay`, either after writing
/// (acknowledgement lost) or before writing (write lost). Only the first
/// `slow_commits` commits are delayed.
pub(crate) struct SlowCommit {
    inner: MemoryBonusStore,
    delay: Duration,
    write_first: bool,
    slow_commits: AtomicU32,
}

impl SlowCommit {
    pub(crate) fn new(inner: MemoryBonusStore, write_first: bool, slow_commits: u32) -> Self {
        Self {
            inner,
            delay: Duration::from_millis(200),
            write_first,
            slow_commits: AtomicU32::new(slow_commits),
        }
    }
}

#[async_trait]
impl BonusStore for SlowCommit {
    async fn fetch_account(
        &self,
        key: &CustomerKey,
    ) -> Result<Option<CustomerAccount>, StoreError> {
        self.inner.fetch_account(key).await
    }
    async fn insert_account(&self, key: &CustomerKey) -> Result<CustomerAccount, StoreError> {
        self.inner.insert_account(key).await
    }
    async fn deactivate_account(
        &self,
        key: &CustomerKey,
    ) -> Result<Option<CustomerAccount>, StoreError> {
        self.inner.deactivate_account(key).await
    }
    async fn commit_settlement(
        &self,
        commit: &SettlementCommit,
    ) -> Result<CommitOutcome, StoreError> {
        let slow = self
            .slow_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !slow {
            return self.inner.commit_settlement(commit).await;
        }
        if self.write_first {
            let outcome = self.inner.commit_settlement(commit).await;
            tokio::time::sleep(self.delay).await;
            outcome
        } else {
            tokio::time::sleep(self.delay).await;
            self.inner.commit_settlement(commit).await
        }
    }
    async fn fetch_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        self.inner.fetch_order(id).await
    }
    async fn list_orders(
        &self,
        key: &CustomerKey,
        limit: i64,
    ) -> Result<Vec<Order>, StoreError> {
        self.inner.list_orders(key, limit).await
    }
    async fn ledger_entries(&self, key: &CustomerKey) -> Result<Vec<LedgerEntry>, StoreError> {
        self.inner.ledger_entries(key).await
    }
}
