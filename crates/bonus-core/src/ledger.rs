//! Audit ledger lines and replay.
//!
//! Every balance mutation is mirrored by at most two append-only lines: a
//! `spent` line (negative delta) followed by an `earned` line (positive
//! delta). Zero-valued lines are never written. Replaying a customer's lines
//! in commit order must reproduce the stored balance without any prefix sum
//! dropping below zero.

use serde::{Deserialize, Serialize};

use crate::balance::BalanceDelta;

/// Why a ledger line changed the balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerReason {
    /// Bonus credited for an order's payable amount.
    Earned,
    /// Bonus redeemed against an order.
    Spent,
}

impl LedgerReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerReason::Earned => "earned",
            LedgerReason::Spent => "spent",
        }
    }
}

/// One balance-affecting event, before it is given an id and timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerLine {
    pub reason: LedgerReason,
    /// Signed change: negative for `Spent`, positive for `Earned`.
    pub delta: i64,
    /// Running balance immediately after this line.
    pub balance_after: i64,
}

/// Builds the ledger lines mirroring `delta` applied on top of `balance_before`.
///
/// The caller is expected to have validated the delta with
/// [`crate::BalanceState::apply`]; the running balances here follow the same
/// spend-then-earn order.
pub fn ledger_lines(balance_before: i64, delta: BalanceDelta) -> Vec<LedgerLine> {
    let mut lines = Vec::with_capacity(2);
    let mut running = balance_before;

    if delta.spent > 0 {
        running -= delta.spent;
        lines.push(LedgerLine {
            reason: LedgerReason::Spent,
            delta: -delta.spent,
            balance_after: running,
        });
    }
    if delta.earned > 0 {
        running += delta.earned;
        lines.push(LedgerLine {
            reason: LedgerReason::Earned,
            delta: delta.earned,
            balance_after: running,
        });
    }

    lines
}

/// Inconsistencies found while replaying a ledger.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    #[error("entry {index} drives the balance negative ({balance})")]
    NegativePrefix { index: usize, balance: i64 },

    #[error("entry {index} has reason {reason} but delta {delta}")]
    SignMismatch {
        index: usize,
        reason: &'static str,
        delta: i64,
    },

    #[error("entry {index} overflows the running balance")]
    Overflow { index: usize },
}

/// Replays `(reason, delta)` pairs from a zero balance and returns the final sum.
pub fn replay<I>(entries: I) -> Result<i64, ReplayError>
where
    I: IntoIterator<Item = (LedgerReason, i64)>,
{
    let mut balance: i64 = 0;
    for (index, (reason, delta)) in entries.into_iter().enumerate() {
        let sign_ok = match reason {
            LedgerReason::Earned => delta > 0,
            LedgerReason::Spent => delta < 0,
        };
        if !sign_ok {
            return Err(ReplayError::SignMismatch {
                index,
                reason: reason.as_str(),
                delta,
            });
        }
        balance = balance
            .checked_add(delta)
            .ok_or(ReplayError::Overflow { index })?;
        if balance < 0 {
            return Err(ReplayError::NegativePrefix { index, balance });
        }
    }
    Ok(balance)
}
