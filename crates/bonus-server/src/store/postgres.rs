//! PostgreSQL store.
//!
//! The balance compare-and-swap is a conditional `UPDATE ... WHERE version = $n`
//! run inside the same transaction as the order and ledger inserts. A
//! conflicting writer makes the `UPDATE` match zero rows, in which case the
//! transaction is rolled back and nothing is persisted.

use async_trait::async_trait;
use bonus_core::CustomerKey;
use sqlx::PgPool;
use uuid::Uuid;

use super::{BonusStore, CommitOutcome, SettlementCommit, StoreError};
use crate::models::{CustomerAccount, LedgerEntry, Order};

const ACCOUNT_COLUMNS: &str =
    "customer_key, balance, version, lifetime_orders, active, created_at, updated_at";

const ORDER_COLUMNS: &str =
    "id, customer_key, amount, bonus_used, payable_amount, bonus_earned, balance_after, status, created_at";

/// [`BonusStore`] backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgBonusStore {
    pool: PgPool,
}

impl PgBonusStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Postgres error code for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Postgres error code for `check_violation`.
const CHECK_VIOLATION: &str = "23514";

fn has_code(err: &sqlx::Error, expected: &str) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == expected)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    has_code(err, UNIQUE_VIOLATION)
}

fn constraint_or_database(err: sqlx::Error) -> StoreError {
    if has_code(&err, CHECK_VIOLATION) {
        StoreError::ConstraintViolation(err.to_string())
    } else {
        StoreError::Database(err)
    }
}

#[async_trait]
impl BonusStore for PgBonusStore {
    async fn fetch_account(&self, key: &CustomerKey) -> Result<Option<CustomerAccount>, StoreError> {
        let account: Option<CustomerAccount> = sqlx::query_as(&format!(
            "SELECT {} FROM customer_accounts WHERE customer_key = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn insert_account(&self, key: &CustomerKey) -> Result<CustomerAccount, StoreError> {
        let result: Result<CustomerAccount, sqlx::Error> = sqlx::query_as(&format!(
            r#"
            INSERT INTO customer_accounts (customer_key, balance, version, lifetime_orders, active, created_at, updated_at)
            VALUES ($1, 0, 0, 0, TRUE, NOW(), NOW())
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(key.as_str())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(account) => Ok(account),
            Err(e) if is_unique_violation(&e) => Err(StoreError::AlreadyExists(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn deactivate_account(
        &self,
        key: &CustomerKey,
    ) -> Result<Option<CustomerAccount>, StoreError> {
        // Bumping the version makes any in-flight settlement fail its CAS.
        let account: Option<CustomerAccount> = sqlx::query_as(&format!(
            r#"
            UPDATE customer_accounts
            SET active = FALSE,
                version = CASE WHEN active THEN version + 1 ELSE version END,
                updated_at = CASE WHEN active THEN NOW() ELSE updated_at END
            WHERE customer_key = $1
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn commit_settlement(
        &self,
        commit: &SettlementCommit,
    ) -> Result<CommitOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let lifetime_increment: i64 = if commit.order.is_some() { 1 } else { 0 };
        let account: Option<CustomerAccount> = sqlx::query_as(&format!(
            r#"
            UPDATE customer_accounts
            SET balance = $3,
                version = version + 1,
                lifetime_orders = lifetime_orders + $4,
                updated_at = NOW()
            WHERE customer_key = $1 AND version = $2 AND active
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(&commit.customer_key)
        .bind(commit.expected_version)
        .bind(commit.new_balance)
        .bind(lifetime_increment)
        .fetch_optional(&mut *tx)
        .await
        .map_err(constraint_or_database)?;

        let Some(account) = account else {
            tx.rollback().await?;
            return Ok(CommitOutcome::VersionConflict);
        };

        let order = match &commit.order {
            Some(new_order) => {
                let order: Order = sqlx::query_as(&format!(
                    r#"
                    INSERT INTO orders (id, customer_key, amount, bonus_used, payable_amount, bonus_earned, balance_after, status, created_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, 'completed', NOW())
                    RETURNING {}
                    "#,
                    ORDER_COLUMNS
                ))
                .bind(new_order.id)
                .bind(&new_order.customer_key)
                .bind(new_order.amount)
                .bind(new_order.bonus_used)
                .bind(new_order.payable_amount)
                .bind(new_order.bonus_earned)
                .bind(new_order.balance_after)
                .fetch_one(&mut *tx)
                .await?;

                for item in new_order.stored_line_items() {
                    sqlx::query(
                        r#"
                        INSERT INTO order_line_items (order_id, position, product_id, quantity, unit_price)
                        VALUES ($1, $2, $3, $4, $5)
                        "#,
                    )
                    .bind(item.order_id)
                    .bind(item.position)
                    .bind(&item.product_id)
                    .bind(item.quantity)
                    .bind(item.unit_price)
                    .execute(&mut *tx)
                    .await?;
                }

                Some(order)
            }
            None => None,
        };

        for entry in &commit.entries {
            sqlx::query(
                r#"
                INSERT INTO bonus_ledger_entries (id, customer_key, order_id, reason, delta, balance_after, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, NOW())
                "#,
            )
            .bind(entry.id)
            .bind(&entry.customer_key)
            .bind(entry.order_id)
            .bind(entry.reason)
            .bind(entry.delta)
            .bind(entry.balance_after)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(CommitOutcome::Committed { account, order })
    }

    async fn fetch_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let order: Option<Order> = sqlx::query_as(&format!(
            "SELECT {} FROM orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    async fn list_orders(&self, key: &CustomerKey, limit: i64) -> Result<Vec<Order>, StoreError> {
        // seq follows commit order per customer: settlements of one customer
        // are serialized on the account row.
        let orders: Vec<Order> = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM orders
            WHERE customer_key = $1 AND status = 'completed'
            ORDER BY seq DESC
            LIMIT $2
            "#,
            ORDER_COLUMNS
        ))
        .bind(key.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    async fn ledger_entries(&self, key: &CustomerKey) -> Result<Vec<LedgerEntry>, StoreError> {
        let entries: Vec<LedgerEntry> = sqlx::query_as(
            r#"
            SELECT id, seq, customer_key, order_id, reason, delta, balance_after, created_at
            FROM bonus_ledger_entries
            WHERE customer_key = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(key.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}
