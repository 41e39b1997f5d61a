//! Earn rate expressed in basis points.
//!
//! Holding the rate as an integer number of basis points keeps the
//! `floor(payable × rate)` computation exact: `payable × bps / 10_000`
//! with integer division on a non-negative payable amount is the floor.

use serde::{Deserialize, Serialize};

use crate::error::BonusError;

/// Basis points in one whole (100%).
pub const BPS_PER_UNIT: u32 = 10_000;

/// Default earn rate: 5%.
pub const DEFAULT_EARN_RATE_BPS: u32 = 500;

/// Percentage of the payable amount credited back as bonus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarnRate {
    bps: u32,
}

impl Default for EarnRate {
    fn default() -> Self {
        Self {
            bps: DEFAULT_EARN_RATE_BPS,
        }
    }
}

impl EarnRate {
    /// Creates a rate from basis points. Rates above 100% are rejected.
    pub fn from_bps(bps: u32) -> Result<Self, BonusError> {
        if bps > BPS_PER_UNIT {
            return Err(BonusError::InvalidAmount(format!(
                "earn rate {} bps exceeds 100%",
                bps
            )));
        }
        Ok(Self { bps })
    }

    /// Parses a percentage such as `5`, `2.5`, `7.25` or `5%`.
    ///
    /// At most two decimal places are accepted so the value maps exactly onto
    /// basis points.
    pub fn from_percent_str(raw: &str) -> Result<Self, BonusError> {
        let trimmed = raw.trim();
        let value = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
        let invalid = || BonusError::InvalidAmount(format!("invalid earn rate: '{}'", raw));

        let (whole, fraction) = match value.split_once('.') {
            Some((w, f)) => (w, f),
            None => (value, ""),
        };
        if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if fraction.len() > 2 || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let whole: u32 = whole.parse().map_err(|_| invalid())?;
        let mut fraction_bps: u32 = if fraction.is_empty() {
            0
        } else {
            fraction.parse().map_err(|_| invalid())?
        };
        if fraction.len() == 1 {
            fraction_bps *= 10;
        }

        let bps = whole
            .checked_mul(100)
            .and_then(|b| b.checked_add(fraction_bps))
            .ok_or_else(invalid)?;
        Self::from_bps(bps)
    }

    pub fn bps(&self) -> u32 {
        self.bps
    }

    /// Bonus earned on a payable amount: `floor(payable × rate)`.
    pub fn earned_on(&self, payable: i64) -> Result<i64, BonusError> {
        if payable < 0 {
            return Err(BonusError::InvalidAmount(format!(
                "payable amount must not be negative, got {}",
                payable
            )));
        }
        let earned = (payable as i128) * (self.bps as i128) / (BPS_PER_UNIT as i128);
        // bps <= 10_000 so earned <= payable, which already fits in i64
        Ok(earned as i64)
    }
}

impl std::fmt::Display for EarnRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}%", self.bps / 100, self.bps % 100)
    }
}
