//! The account ledger state.

use crate::LedgerConfig;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use snapline_messages::PeerMessage;
use snapline_types::{Balance, LineTopology, NodeId};
use std::time::Duration;
use tracing::{debug, info, warn};

/// What caused a balance change attributable to another node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    /// A CREDIT from `channel` increased the balance.
    Credit,
    /// A DEBIT request from `channel` decreased the balance.
    Debit,
}

/// A balance change caused by a message received on `channel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceEffect {
    pub channel: NodeId,
    pub delta: Balance,
    pub kind: EffectKind,
}

/// Result of honoring a DEBIT request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebitOutcome {
    /// CREDIT to send back to the requester.
    pub reply: PeerMessage,
    pub effect: BalanceEffect,
}

/// Cumulative ledger counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerStats {
    pub credits_applied: u64,
    pub debits_applied: u64,
    pub debits_rejected: u64,
    pub transfers_generated: u64,
}

/// A single node's account.
pub struct AccountLedger {
    topology: LineTopology,
    config: LedgerConfig,
    balance: Balance,
    rng: ChaCha8Rng,
    stats: LedgerStats,
}

impl std::fmt::Debug for AccountLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountLedger")
            .field("node", &self.topology.local())
            .field("balance", &self.balance)
            .field("stats", &self.stats)
            .finish()
    }
}

impl AccountLedger {
    /// Create a ledger holding `config.initial_balance`.
    ///
    /// All randomness (transfer destinations, amounts, delays) is drawn from
    /// a generator seeded with `seed`.
    pub fn new(topology: LineTopology, config: LedgerConfig, seed: u64) -> Self {
        Self {
            topology,
            balance: config.initial_balance,
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
            stats: LedgerStats::default(),
        }
    }

    /// Current balance.
    pub fn balance(&self) -> Balance {
        self.balance
    }

    pub fn stats(&self) -> LedgerStats {
        self.stats
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn accepts(&self, peer: NodeId, amount: Balance) -> bool {
        self.topology.is_remote(peer) && amount > 0
    }

    /// Apply an inbound CREDIT.
    ///
    /// Ignored when `src` is not another node of the line, `amount` is not
    /// positive, or the new balance would not fit in a [`Balance`].
    pub fn apply_credit(&mut self, src: NodeId, amount: Balance) -> Option<BalanceEffect> {
        if !self.accepts(src, amount) {
            debug!(src = %src, amount, "Ignoring invalid CREDIT");
            return None;
        }

        let Some(balance) = self.balance.checked_add(amount) else {
            warn!(
                src = %src,
                amount,
                balance = self.balance,
                "Ignoring CREDIT that would overflow the balance"
            );
            return None;
        };
        self.balance = balance;
        self.stats.credits_applied += 1;
        info!(src = %src, amount, balance = self.balance, "CREDIT applied");

        Some(BalanceEffect {
            channel: src,
            delta: amount,
            kind: EffectKind::Credit,
        })
    }

    /// Honor an inbound DEBIT request by sending `amount` back to `src`.
    ///
    /// Requests that cannot be covered by the current balance are dropped
    /// with a warning; the requester is not told.
    pub fn apply_debit_request(&mut self, src: NodeId, amount: Balance) -> Option<DebitOutcome> {
        if !self.accepts(src, amount) {
            debug!(src = %src, amount, "Ignoring invalid DEBIT");
            return None;
        }

        if self.balance < amount {
            self.stats.debits_rejected += 1;
            warn!(
                src = %src,
                amount,
                balance = self.balance,
                "Insufficient balance to perform DEBIT"
            );
            return None;
        }

        let reply = PeerMessage::Credit {
            src_node_id: self.topology.local(),
            dst_node_id: src,
            amount,
        };
        self.balance -= amount;
        self.stats.debits_applied += 1;
        info!(src = %src, amount, balance = self.balance, "DEBIT applied");

        Some(DebitOutcome {
            reply,
            effect: BalanceEffect {
                channel: src,
                delta: -amount,
                kind: EffectKind::Debit,
            },
        })
    }

    /// Pick a random peer and either push money to it or ask it for money.
    ///
    /// A CREDIT is only chosen when the balance covers the amount; otherwise
    /// the transfer becomes a DEBIT. Returns `None` when the line has no
    /// other node.
    pub fn generate_random_transfer(&mut self) -> Option<PeerMessage> {
        let others: Vec<NodeId> = self.topology.other_nodes().collect();
        let dst = *others.choose(&mut self.rng)?;

        let want_credit = self.rng.gen_bool(0.5);
        let amount = self
            .rng
            .gen_range(self.config.min_amount..=self.config.max_amount);
        self.stats.transfers_generated += 1;

        if want_credit {
            if let Some(message) = self.send_credit(dst, amount) {
                return Some(message);
            }
        }

        info!(dst = %dst, amount, "DEBIT requested");
        Some(PeerMessage::Debit {
            src_node_id: self.topology.local(),
            dst_node_id: dst,
            amount,
        })
    }

    /// Move `amount` out of this account towards `dst`.
    ///
    /// Returns the CREDIT to send, or `None` if `dst` is not another node of
    /// the line, `amount` is not positive, or the balance does not cover it.
    pub fn send_credit(&mut self, dst: NodeId, amount: Balance) -> Option<PeerMessage> {
        if !self.accepts(dst, amount) || self.balance < amount {
            return None;
        }

        self.balance -= amount;
        info!(dst = %dst, amount, balance = self.balance, "CREDIT sent");
        Some(PeerMessage::Credit {
            src_node_id: self.topology.local(),
            dst_node_id: dst,
            amount,
        })
    }

    /// Delay until the next random transfer.
    pub fn next_transfer_delay(&mut self) -> Duration {
        self.rng
            .gen_range(self.config.min_transfer_delay..=self.config.max_transfer_delay)
    }
}
