//! In-memory store, used by tests and local development.
//!
//! All state lives behind one `RwLock`, so a commit observes and mutates the
//! account, orders and ledger as a single unit, matching the transactional
//! guarantees of the PostgreSQL store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bonus_core::CustomerKey;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{BonusStore, CommitOutcome, SettlementCommit, StoreError};
use crate::models::{CustomerAccount, LedgerEntry, Order, OrderLineItem};

#[derive(Debug, Default)]
struct MemoryState {
    accounts: HashMap<String, CustomerAccount>,
    orders: Vec<Order>,
    line_items: Vec<OrderLineItem>,
    entries: Vec<LedgerEntry>,
    next_seq: i64,
}

/// Thread-safe in-memory [`BonusStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryBonusStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryBonusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test and local-development fixture: seeds an account with an opening
    /// balance, bypassing registration and settlement.
    ///
    /// The opening amount is recorded as one `earned` entry without an order
    /// so ledger replay stays consistent with the stored balance. Serving
    /// code never calls this; production accounts start at zero through
    /// [`BonusStore::insert_account`].
    pub async fn seed_account(&self, key: &CustomerKey, balance: i64) -> CustomerAccount {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let mut account = CustomerAccount::new(key.as_str().to_string(), now);
        account.balance = balance;
        if balance > 0 {
            state.next_seq += 1;
            let seq = state.next_seq;
            state.entries.push(LedgerEntry {
                id: uuid::Uuid::new_v4(),
                seq,
                customer_key: key.as_str().to_string(),
                order_id: None,
                reason: crate::models::EntryReason::Earned,
                delta: balance,
                balance_after: balance,
                created_at: now,
            });
        }
        state
            .accounts
            .insert(key.as_str().to_string(), account.clone());
        account
    }

    /// Stored line items of an order, in position order.
    pub async fn line_items(&self, order_id: uuid::Uuid) -> Vec<OrderLineItem> {
        let state = self.state.read().await;
        let mut items: Vec<OrderLineItem> = state
            .line_items
            .iter()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect();
        items.sort_by_key(|item| item.position);
        items
    }

    /// Total number of orders across all customers.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait]
impl BonusStore for MemoryBonusStore {
    async fn fetch_account(&self, key: &CustomerKey) -> Result<Option<CustomerAccount>, StoreError> {
        let state = self.state.read().await;
        Ok(state.accounts.get(key.as_str()).cloned())
    }

    async fn insert_account(&self, key: &CustomerKey) -> Result<CustomerAccount, StoreError> {
        let mut state = self.state.write().await;
        if state.accounts.contains_key(key.as_str()) {
            return Err(StoreError::AlreadyExists(key.to_string()));
        }
        let account = CustomerAccount::new(key.as_str().to_string(), Utc::now());
        state
            .accounts
            .insert(key.as_str().to_string(), account.clone());
        Ok(account)
    }

    async fn deactivate_account(
        &self,
        key: &CustomerKey,
    ) -> Result<Option<CustomerAccount>, StoreError> {
        let mut state = self.state.write().await;
        let Some(account) = state.accounts.get_mut(key.as_str()) else {
            return Ok(None);
        };
        if account.active {
            account.active = false;
            account.version += 1;
            account.updated_at = Utc::now();
        }
        Ok(Some(account.clone()))
    }

    async fn commit_settlement(
        &self,
        commit: &SettlementCommit,
    ) -> Result<CommitOutcome, StoreError> {
        if commit.new_balance < 0 {
            return Err(StoreError::ConstraintViolation(format!(
                "balance of {} cannot become {}",
                commit.customer_key, commit.new_balance
            )));
        }

        let mut state = self.state.write().await;
        let now = Utc::now();

        let Some(current) = state.accounts.get(&commit.customer_key) else {
            return Ok(CommitOutcome::VersionConflict);
        };
        if !current.active || current.version != commit.expected_version {
            return Ok(CommitOutcome::VersionConflict);
        }
        let mut account = current.clone();
        account.balance = commit.new_balance;
        account.version += 1;
        account.updated_at = now;
        if commit.order.is_some() {
            account.lifetime_orders += 1;
        }

        let order = commit.order.clone().map(|new_order| {
            state.line_items.extend(new_order.stored_line_items());
            new_order.into_order(now)
        });
        if let Some(order) = &order {
            state.orders.push(order.clone());
        }

        for entry in &commit.entries {
            state.next_seq += 1;
            let seq = state.next_seq;
            state.entries.push(entry.clone().into_entry(seq, now));
        }

        state
            .accounts
            .insert(commit.customer_key.clone(), account.clone());

        Ok(CommitOutcome::Committed { account, order })
    }

    async fn fetch_order(&self, id: uuid::Uuid) -> Result<Option<Order>, StoreError> {
        let state = self.state.read().await;
        Ok(state.orders.iter().find(|order| order.id == id).cloned())
    }

    async fn list_orders(&self, key: &CustomerKey, limit: i64) -> Result<Vec<Order>, StoreError> {
        let state = self.state.read().await;
        // Insertion order is commit order, which breaks created_at ties.
        Ok(state
            .orders
            .iter()
            .rev()
            .filter(|order| order.customer_key == key.as_str())
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn ledger_entries(&self, key: &CustomerKey) -> Result<Vec<LedgerEntry>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .entries
            .iter()
            .filter(|entry| entry.customer_key == key.as_str())
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryReason, NewLedgerEntry, NewOrder};
    use bonus_core::{BalanceState, EarnRate, LineItem, Quote};
    use uuid::Uuid;

    fn key(raw: &str) -> CustomerKey {
        CustomerKey::parse(raw).unwrap()
    }

    fn order_commit(account: &CustomerAccount, amount: i64, spend: i64) -> SettlementCommit {
        let items = vec![LineItem::new("mocha", 1, amount)];
        let settlement = Quote::new(&items, spend, None)
            .unwrap()
            .settle(BalanceState::new(account.balance, account.version), EarnRate::default())
            .unwrap();
        let order_id = Uuid::new_v4();
        SettlementCommit {
            customer_key: account.customer_key.clone(),
            expected_version: account.version,
            new_balance: settlement.after.balance,
            order: Some(NewOrder::from_settlement(
                order_id,
                &account.customer_key,
                &items,
                &settlement,
            )),
            entries: NewLedgerEntry::from_lines(
                &account.customer_key,
                Some(order_id),
                &settlement.ledger_lines(),
            ),
        }
    }

    #[tokio::test]
    async fn test_insert_and_fetch_account() {
        let store = MemoryBonusStore::new();
        let created = store.insert_account(&key("acct-1")).await.unwrap();
        assert_eq!(created.balance, 0);

        let fetched = store.fetch_account(&key("acct-1")).await.unwrap();
        assert_eq!(fetched, Some(created));
        assert!(store.fetch_account(&key("acct-2")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_duplicate_account() {
        let store = MemoryBonusStore::new();
        store.insert_account(&key("acct-1")).await.unwrap();
        assert!(matches!(
            store.insert_account(&key("acct-1")).await,
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_commit_applies_everything() {
        let store = MemoryBonusStore::new();
        let account = store.insert_account(&key("acct-1")).await.unwrap();
        let commit = order_commit(&account, 1000, 0);

        let outcome = store.commit_settlement(&commit).await.unwrap();
        let CommitOutcome::Committed { account, order } = outcome else {
            panic!("expected commit");
        };
        assert_eq!(account.balance, 50);
        assert_eq!(account.version, 1);
        assert_eq!(account.lifetime_orders, 1);

        let order = order.unwrap();
        assert_eq!(store.line_items(order.id).await.len(), 1);

        let entries = store.ledger_entries(&key("acct-1")).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].reason, EntryReason::Earned);
        assert_eq!(entries[0].order_id, Some(order.id));
    }

    #[tokio::test]
    async fn test_stale_version_writes_nothing() {
        let store = MemoryBonusStore::new();
        let account = store.seed_account(&key("acct-1"), 100).await;
        let first = order_commit(&account, 100, 80);
        let stale = order_commit(&account, 100, 80);

        assert!(matches!(
            store.commit_settlement(&first).await.unwrap(),
            CommitOutcome::Committed { .. }
        ));
        assert_eq!(
            store.commit_settlement(&stale).await.unwrap(),
            CommitOutcome::VersionConflict
        );

        let account = store.fetch_account(&key("acct-1")).await.unwrap().unwrap();
        assert_eq!(account.balance, 21);
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_negative_balance_rejected() {
        let store = MemoryBonusStore::new();
        let account = store.seed_account(&key("acct-1"), 10).await;
        let mut commit = order_commit(&account, 100, 0);
        commit.new_balance = -1;

        assert!(matches!(
            store.commit_settlement(&commit).await,
            Err(StoreError::ConstraintViolation(_))
        ));

        let account = store.fetch_account(&key("acct-1")).await.unwrap().unwrap();
        assert_eq!(account.balance, 10);
        assert_eq!(account.version, 0);
        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.ledger_entries(&key("acct-1")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_order_after_commit() {
        let store = MemoryBonusStore::new();
        let account = store.insert_account(&key("acct-1")).await.unwrap();
        let commit = order_commit(&account, 400, 0);
        let id = commit.order.as_ref().unwrap().id;

        assert!(store.fetch_order(id).await.unwrap().is_none());
        store.commit_settlement(&commit).await.unwrap();

        let order = store.fetch_order(id).await.unwrap().unwrap();
        assert_eq!(order.amount, 400);
        assert_eq!(order.bonus_earned, 20);
    }

    #[tokio::test]
    async fn test_deactivated_account_rejects_commit() {
        let store = MemoryBonusStore::new();
        let account = store.insert_account(&key("acct-1")).await.unwrap();
        let commit = order_commit(&account, 1000, 0);

        let deactivated = store
            .deactivate_account(&key("acct-1"))
            .await
            .unwrap()
            .unwrap();
        assert!(!deactivated.active);
        assert_eq!(deactivated.version, 1);

        assert_eq!(
            store.commit_settlement(&commit).await.unwrap(),
            CommitOutcome::VersionConflict
        );
    }

    #[tokio::test]
    async fn test_list_orders_most_recent_first() {
        let store = MemoryBonusStore::new();
        let mut account = store.insert_account(&key("acct-1")).await.unwrap();
        let mut ids = Vec::new();
        for amount in [100, 200, 300] {
            let commit = order_commit(&account, amount, 0);
            ids.push(commit.order.as_ref().unwrap().id);
            match store.commit_settlement(&commit).await.unwrap() {
                CommitOutcome::Committed { account: next, .. } => account = next,
                CommitOutcome::VersionConflict => panic!("unexpected conflict"),
            }
        }

        let orders = store.list_orders(&key("acct-1"), 2).await.unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].id, ids[2]);
        assert_eq!(orders[1].id, ids[1]);
    }
}
