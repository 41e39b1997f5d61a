//! Bonus ledger: the only component that reads or mutates balances.
//!
//! Mutations follow an optimistic loop. The account is read, the caller's
//! plan turns that snapshot into a [`SettlementCommit`], and the store
//! applies it only if the account version is unchanged. On a version
//! conflict the whole plan is recomputed from a fresh read, so every check
//! that depends on the balance (such as `InsufficientBalance`) is evaluated
//! against the state that actually gets committed.
//!
//! A commit whose acknowledgement does not arrive within the store timeout is
//! not reported as failed straight away. The ledger first settles whether it
//! landed: if the account is still at the planned version, a no-op fence
//! commit is made at that version. Once the fence commits, the lost write can
//! never apply. Otherwise the order or ledger rows of the
//! lost commit are looked up. `StoreUnavailable` is only returned when the
//! write is known not to have landed, or when even that could not be
//! established.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bonus_core::{
    ledger_digest, ledger_lines, replay, BalanceDelta, BonusError, CustomerKey, LedgerReason,
};
use rand::Rng;
use serde::Serialize;
use tokio::time::timeout;
use uuid::Uuid;

use crate::config::LedgerSettings;
use crate::error::AppError;
use crate::models::{CustomerAccount, LedgerEntry, NewLedgerEntry, Order};
use crate::store::{BonusStore, CommitOutcome, SettlementCommit, StoreError};

/// Jittered exponential backoff between compare-and-swap attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Upper bound of the delay after the given failed attempt (1-based).
    pub fn ceiling_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Random delay in `[0, ceiling]` so colliding writers spread out.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling_for_attempt(attempt).as_micros() as u64;
        if ceiling == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(rand::thread_rng().gen_range(0..=ceiling))
    }
}

/// A committed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    /// Account state as last read. Equals the post-commit state unless the
    /// acknowledgement was lost and later commits followed.
    pub account: CustomerAccount,
    /// Balance written by this commit.
    pub balance: i64,
    pub order: Option<Order>,
    /// Compare-and-swap attempts used, including the successful one.
    pub attempts: u32,
}

/// Result of replaying a customer's ledger against the stored balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerVerification {
    pub customer_key: String,
    pub stored_balance: i64,
    /// Sum of the ledger; `None` if the entries could not be replayed.
    pub replayed_balance: Option<i64>,
    pub entry_count: usize,
    pub consistent: bool,
    /// SHA-256 over the canonical JSON of the entries.
    pub digest: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
}

/// Fields of an entry covered by the ledger digest.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DigestEntry<'a> {
    id: Uuid,
    seq: i64,
    order_id: Option<Uuid>,
    reason: &'a str,
    delta: i64,
    balance_after: i64,
}

#[derive(Clone)]
pub struct BonusLedger {
    store: Arc<dyn BonusStore>,
    retry: RetryPolicy,
    store_timeout: Duration,
}

impl BonusLedger {
    pub fn new(store: Arc<dyn BonusStore>, settings: &LedgerSettings) -> Self {
        Self {
            store,
            retry: RetryPolicy::with_max_attempts(settings.cas_max_attempts),
            store_timeout: settings.store_timeout,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Runs one store call under the configured timeout.
    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match timeout(self.store_timeout, call).await {
            Ok(result) => result.map_err(AppError::from),
            Err(_) => {
                let timeout_ms = self.store_timeout.as_millis() as u64;
                tracing::warn!(operation, timeout_ms, "Store call timed out");
                Err(BonusError::StoreUnavailable(format!(
                    "{} timed out after {}ms",
                    operation, timeout_ms
                ))
                .into())
            }
        }
    }

    /// Loads an account, active or not.
    pub async fn account(&self, key: &CustomerKey) -> Result<CustomerAccount, AppError> {
        self.bounded("fetch_account", self.store.fetch_account(key))
            .await?
            .ok_or_else(|| BonusError::NotFound(key.to_string()).into())
    }

    /// Current balance. Deactivated customers still report theirs.
    pub async fn balance(&self, key: &CustomerKey) -> Result<i64, AppError> {
        Ok(self.account(key).await?.balance)
    }

    /// Applies a mutation planned from a fresh account snapshot, retrying
    /// the plan on version conflicts.
    pub async fn settle<P>(&self, key: &CustomerKey, plan: P) -> Result<Applied, AppError>
    where
        P: Fn(&CustomerAccount) -> Result<SettlementCommit, BonusError>,
    {
        let max_attempts = self.retry.max_attempts;

        for attempt in 1..=max_attempts {
            let account = self.account(key).await?;
            if !account.active {
                return Err(BonusError::NotFound(format!("{} is deactivated", key)).into());
            }

            let commit = plan(&account)?;
            let outcome =
                match timeout(self.store_timeout, self.store.commit_settlement(&commit)).await {
                    Ok(result) => result?,
                    Err(_) => {
                        let mut applied = self.resolve_lost_commit(key, &commit).await?;
                        applied.attempts = attempt;
                        return Ok(applied);
                    }
                };

            match outcome {
                CommitOutcome::Committed { account, order } => {
                    return Ok(Applied {
                        balance: account.balance,
                        account,
                        order,
                        attempts: attempt,
                    });
                }
                CommitOutcome::VersionConflict if attempt < max_attempts => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    tracing::debug!(
                        customer_key = %key,
                        attempt,
                        delay_us = delay.as_micros() as u64,
                        "Balance version conflict, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                CommitOutcome::VersionConflict => {}
            }
        }

        tracing::warn!(
            customer_key = %key,
            attempts = max_attempts,
            "Gave up on contended balance"
        );
        Err(BonusError::Contention {
            attempts: max_attempts,
        }
        .into())
    }

    /// Decides the fate of a commit that timed out before acknowledging.
    ///
    /// Returns the commit as applied if it landed, and `StoreUnavailable` if
    /// it did not or if that cannot be determined in time.
    async fn resolve_lost_commit(
        &self,
        key: &CustomerKey,
        commit: &SettlementCommit,
    ) -> Result<Applied, AppError> {
        let timeout_ms = self.store_timeout.as_millis() as u64;
        tracing::warn!(
            customer_key = %key,
            expected_version = commit.expected_version,
            timeout_ms,
            "Commit acknowledgement timed out, reconciling"
        );
        let unavailable = || -> AppError {
            BonusError::StoreUnavailable(format!(
                "commit_settlement timed out after {}ms",
                timeout_ms
            ))
            .into()
        };

        let account = self.account(key).await?;
        if account.version == commit.expected_version {
            let fence = SettlementCommit {
                customer_key: commit.customer_key.clone(),
                expected_version: commit.expected_version,
                new_balance: account.balance,
                order: None,
                entries: Vec::new(),
            };
            let fenced = self
                .bounded("commit_settlement", self.store.commit_settlement(&fence))
                .await?;
            if let CommitOutcome::Committed { .. } = fenced {
                tracing::info!(customer_key = %key, "Lost commit fenced off, nothing was written");
                return Err(unavailable());
            }
        }

        let (landed, order) = match &commit.order {
            Some(new_order) => {
                let order = self
                    .bounded("fetch_order", self.store.fetch_order(new_order.id))
                    .await?;
                (order.is_some(), order)
            }
            None => {
                let entries = self
                    .bounded("ledger_entries", self.store.ledger_entries(key))
                    .await?;
                let landed = commit
                    .entries
                    .first()
                    .is_some_and(|planned| entries.iter().any(|entry| entry.id == planned.id));
                (landed, None)
            }
        };

        if !landed {
            return Err(unavailable());
        }

        tracing::info!(customer_key = %key, "Lost commit had landed");
        let account = self.account(key).await?;
        Ok(Applied {
            account,
            balance: commit.new_balance,
            order,
            attempts: 1,
        })
    }

    /// Adds `earned` and removes `spent` in one atomic step, returning the
    /// new balance.
    pub async fn apply_delta(
        &self,
        key: &CustomerKey,
        earned: i64,
        spent: i64,
    ) -> Result<i64, AppError> {
        let delta = BalanceDelta::new(earned, spent)?;
        if delta.is_zero() {
            let account = self.account(key).await?;
            if !account.active {
                return Err(BonusError::NotFound(format!("{} is deactivated", key)).into());
            }
            return Ok(account.balance);
        }

        let applied = self
            .settle(key, |account| {
                let after = account.state().apply(delta)?;
                Ok(SettlementCommit {
                    customer_key: account.customer_key.clone(),
                    expected_version: account.version,
                    new_balance: after.balance,
                    order: None,
                    entries: NewLedgerEntry::from_lines(
                        &account.customer_key,
                        None,
                        &ledger_lines(account.balance, delta),
                    ),
                })
            })
            .await?;

        tracing::info!(
            customer_key = %key,
            earned,
            spent,
            new_balance = applied.balance,
            "Applied balance adjustment"
        );
        Ok(applied.balance)
    }

    /// Creates a zero-balance active customer.
    pub async fn register_customer(&self, key: &CustomerKey) -> Result<CustomerAccount, AppError> {
        let account = self
            .bounded("insert_account", self.store.insert_account(key))
            .await?;
        tracing::info!(customer_key = %key, "Registered customer");
        Ok(account)
    }

    /// Marks a customer inactive. History and balance are kept.
    pub async fn deactivate_customer(
        &self,
        key: &CustomerKey,
    ) -> Result<CustomerAccount, AppError> {
        let account = self
            .bounded("deactivate_account", self.store.deactivate_account(key))
            .await?
            .ok_or_else(|| AppError::from(BonusError::NotFound(key.to_string())))?;
        tracing::info!(customer_key = %key, "Deactivated customer");
        Ok(account)
    }

    /// Completed orders, most recent first.
    pub async fn orders(&self, key: &CustomerKey, limit: i64) -> Result<Vec<Order>, AppError> {
        self.account(key).await?;
        self.bounded("list_orders", self.store.list_orders(key, limit))
            .await
    }

    /// The customer's audit history in commit order.
    pub async fn ledger_entries(&self, key: &CustomerKey) -> Result<Vec<LedgerEntry>, AppError> {
        self.account(key).await?;
        self.bounded("ledger_entries", self.store.ledger_entries(key))
            .await
    }

    /// Replays the ledger and compares it with the stored balance.
    ///
    /// The account is read before and after the entries; a version change in
    /// between means a commit raced the read and the snapshot is retaken.
    pub async fn verify_ledger(&self, key: &CustomerKey) -> Result<LedgerVerification, AppError> {
        let max_attempts = self.retry.max_attempts;

        for attempt in 1..=max_attempts {
            let before = self.account(key).await?;
            let entries = self
                .bounded("ledger_entries", self.store.ledger_entries(key))
                .await?;
            let after = self.account(key).await?;

            if before.version == after.version {
                return verification_report(&after, &entries);
            }
            tokio::time::sleep(self.retry.delay_for_attempt(attempt)).await;
        }

        Err(BonusError::Contention {
            attempts: max_attempts,
        }
        .into())
    }
}

fn verification_report(
    account: &CustomerAccount,
    entries: &[LedgerEntry],
) -> Result<LedgerVerification, AppError> {
    let digest_entries: Vec<DigestEntry<'_>> = entries
        .iter()
        .map(|entry| DigestEntry {
            id: entry.id,
            seq: entry.seq,
            order_id: entry.order_id,
            reason: LedgerReason::from(entry.reason).as_str(),
            delta: entry.delta,
            balance_after: entry.balance_after,
        })
        .collect();
    let digest = ledger_digest(&digest_entries)
        .map_err(|e| AppError::Internal(format!("Failed to digest ledger: {}", e)))?;

    let replayed = replay(
        entries
            .iter()
            .map(|entry| (LedgerReason::from(entry.reason), entry.delta)),
    );

    let (replayed_balance, problem) = match replayed {
        Ok(sum) => {
            let mut running = 0i64;
            let broken_chain = entries.iter().position(|entry| {
                running += entry.delta;
                entry.balance_after != running
            });
            let problem = match broken_chain {
                Some(index) => Some(format!(
                    "entry {} records balance {} but the running sum is different",
                    index, entries[index].balance_after
                )),
                None if sum != account.balance => Some(format!(
                    "ledger sums to {} but the stored balance is {}",
                    sum, account.balance
                )),
                None => None,
            };
            (Some(sum), problem)
        }
        Err(e) => (None, Some(e.to_string())),
    };

    if let Some(problem) = &problem {
        tracing::error!(customer_key = %account.customer_key, %problem, "Ledger verification failed");
    }

    Ok(LedgerVerification {
        customer_key: account.customer_key.clone(),
        stored_balance: account.balance,
        replayed_balance,
        entry_count: entries.len(),
        consistent: problem.is_none(),
        digest,
        problem,
    })
}
