//! Error taxonomy for bonus ledger and order settlement.
//!
//! Every failure carries a stable machine-readable [`ErrorKind`] plus a
//! human-readable message. Kinds are part of the HTTP contract and must not
//! be renamed.

use serde::{Deserialize, Serialize};

/// Stable, machine-readable error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed or non-positive numeric input.
    InvalidAmount,
    /// Requested bonus spend is larger than the order (or the usage limit).
    BonusExceedsAmount,
    /// Unknown customer key.
    NotFound,
    /// Requested bonus spend is larger than the balance at commit time.
    InsufficientBalance,
    /// Exclusive access to the balance could not be secured in time.
    Contention,
    /// The backing store failed or timed out.
    StoreUnavailable,
    /// Request shape is unusable (missing or malformed customer key).
    InvalidRequest,
}

impl ErrorKind {
    /// Returns the wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidAmount => "InvalidAmount",
            ErrorKind::BonusExceedsAmount => "BonusExceedsAmount",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::InsufficientBalance => "InsufficientBalance",
            ErrorKind::Contention => "Contention",
            ErrorKind::StoreUnavailable => "StoreUnavailable",
            ErrorKind::InvalidRequest => "InvalidRequest",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain error for bonus operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BonusError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Bonus to spend {requested} exceeds the allowed {allowed}")]
    BonusExceedsAmount { requested: i64, allowed: i64 },

    #[error("Customer not found: {0}")]
    NotFound(String),

    #[error("Insufficient bonus balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: i64, available: i64 },

    #[error("Balance is under contention, gave up after {attempts} attempts")]
    Contention { attempts: u32 },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Invalid customer key: {0}")]
    InvalidCustomerKey(String),
}

impl BonusError {
    /// Returns the stable kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BonusError::InvalidAmount(_) => ErrorKind::InvalidAmount,
            BonusError::BonusExceedsAmount { .. } => ErrorKind::BonusExceedsAmount,
            BonusError::NotFound(_) => ErrorKind::NotFound,
            BonusError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            BonusError::Contention { .. } => ErrorKind::Contention,
            BonusError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            BonusError::InvalidCustomerKey(_) => ErrorKind::InvalidRequest,
        }
    }

    /// True when resubmitting the unchanged request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BonusError::Contention { .. } | BonusError::StoreUnavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(ErrorKind::InvalidAmount.as_str(), "InvalidAmount");
        assert_eq!(ErrorKind::BonusExceedsAmount.as_str(), "BonusExceedsAmount");
        assert_eq!(ErrorKind::InsufficientBalance.as_str(), "InsufficientBalance");
        assert_eq!(
            serde_json::to_string(&ErrorKind::StoreUnavailable).unwrap(),
            "\"StoreUnavailable\""
        );
    }

    #[test]
    fn test_error_kind_mapping() {
        let err = BonusError::InsufficientBalance {
            requested: 101,
            available: 100,
        };
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
        assert!(!err.is_transient());

        let err = BonusError::Contention { attempts: 5 };
        assert_eq!(err.kind(), ErrorKind::Contention);
        assert!(err.is_transient());

        let err = BonusError::InvalidCustomerKey("blank".to_string());
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_error_messages_are_human_readable() {
        let err = BonusError::BonusExceedsAmount {
            requested: 1200,
            allowed: 1000,
        };
        assert_eq!(
            err.to_string(),
            "Bonus to spend 1200 exceeds the allowed 1000"
        );
    }
}
