//! Account ledger.
//!
//! Owns a node's balance and applies the money-moving side of the protocol:
//! inbound CREDIT and DEBIT requests, plus periodic random outbound
//! transfers. Every mutation caused by another node is reported back as a
//! [`BalanceEffect`] so the snapshot coordinator can attribute it to the
//! right channel.

mod config;
mod ledger;

pub use config::{LedgerConfig, LedgerConfigError};
pub use ledger::{AccountLedger, BalanceEffect, DebitOutcome, EffectKind, LedgerStats};
