// Customer key validation

use serde::{Deserialize, Serialize};

use crate::error::BonusError;

/// Maximum accepted length of a customer key, in bytes.
pub const MAX_CUSTOMER_KEY_LEN: usize = 128;

/// Stable external identifier of a customer (phone number or account id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CustomerKey(String);

impl CustomerKey {
    /// Parses a raw key, trimming surrounding whitespace.
    ///
    /// Rejects blank keys, keys longer than [`MAX_CUSTOMER_KEY_LEN`] and keys
    /// containing control characters.
    pub fn parse(raw: &str) -> Result<Self, BonusError> {
        let key = raw.trim();
        if key.is_empty() {
            return Err(BonusError::InvalidCustomerKey(
                "customer key must not be blank".to_string(),
            ));
        }
        if key.len() > MAX_CUSTOMER_KEY_LEN {
            return Err(BonusError::InvalidCustomerKey(format!(
                "customer key is longer than {} bytes",
                MAX_CUSTOMER_KEY_LEN
            )));
        }
        if key.chars().any(char::is_control) {
            return Err(BonusError::InvalidCustomerKey(
                "customer key contains control characters".to_string(),
            ));
        }
        Ok(Self(key.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CustomerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CustomerKey {
    type Error = BonusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CustomerKey> for String {
    fn from(key: CustomerKey) -> Self {
        key.0
    }
}
