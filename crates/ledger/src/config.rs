//! Ledger configuration.

use snapline_types::Balance;
use std::time::Duration;

/// Invalid ledger configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerConfigError {
    #[error("initial balance must not be negative, got {0}")]
    NegativeBalance(Balance),

    #[error("transfer amounts must be positive with min <= max, got {min}..={max}")]
    InvalidAmountRange { min: Balance, max: Balance },

    #[error("transfer delay range is empty: {min:?}..={max:?}")]
    InvalidDelayRange { min: Duration, max: Duration },
}

/// Balance and random transfer parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Balance every node starts with.
    pub initial_balance: Balance,
    /// Smallest random transfer amount.
    pub min_amount: Balance,
    /// Largest random transfer amount (inclusive).
    pub max_amount: Balance,
    /// Shortest wait between two random transfers.
    pub min_transfer_delay: Duration,
    /// Longest wait between two random transfers (inclusive).
    pub max_transfer_delay: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            initial_balance: 5_000_000,
            min_amount: 10_000,
            max_amount: 50_000,
            min_transfer_delay: Duration::from_millis(20),
            max_transfer_delay: Duration::from_millis(2000),
        }
    }
}

impl LedgerConfig {
    /// Set the initial balance.
    pub fn with_initial_balance(mut self, balance: Balance) -> Self {
        self.initial_balance = balance;
        self
    }

    /// Set the random transfer amount range.
    pub fn with_amount_range(mut self, min: Balance, max: Balance) -> Self {
        self.min_amount = min;
        self.max_amount = max;
        self
    }

    /// Set the delay range between random transfers.
    pub fn with_transfer_delay(mut self, min: Duration, max: Duration) -> Self {
        self.min_transfer_delay = min;
        self.max_transfer_delay = max;
        self
    }

    /// Check that the ranges are usable for sampling.
    pub fn validate(&self) -> Result<(), LedgerConfigError> {
        if self.initial_balance < 0 {
            return Err(LedgerConfigError::NegativeBalance(self.initial_balance));
        }
        if self.min_amount <= 0 || self.min_amount > self.max_amount {
            return Err(LedgerConfigError::InvalidAmountRange {
                min: self.min_amount,
                max: self.max_amount,
            });
        }
        if self.min_transfer_delay > self.max_transfer_delay {
            return Err(LedgerConfigError::InvalidDelayRange {
                min: self.min_transfer_delay,
                max: self.max_transfer_delay,
            });
        }
        Ok(())
    }
}
