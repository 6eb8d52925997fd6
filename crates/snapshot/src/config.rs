//! Snapshot coordinator configuration.

use serde::Deserialize;

/// How DEBIT-triggered balance decreases are recorded in open sessions.
///
/// Read from configuration as `"skip"` or `"record"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebitRecording {
    /// Only CREDIT increases adjust recorded balances.
    ///
    /// A DEBIT request carries no money. The amount leaves this node with
    /// the CREDIT it sends back, which happens after this node's cut, so the
    /// recorded balance must still include it.
    #[default]
    Skip,

    /// DEBIT decreases adjust recorded balances like CREDIT increases do.
    ///
    /// A snapshot can come up short by the debited amount.
    Record,
}

/// Snapshot coordinator configuration.
///
/// The default records only CREDIT increases on open channels, which keeps
/// every snapshot's total equal to the money in the system. The historical
/// rule, which also applies DEBIT decreases, is [`DebitRecording::Record`].
/// It can under-count when a MARKER and a DEBIT request cross.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotConfig {
    pub debit_recording: DebitRecording,
}

impl SnapshotConfig {
    /// Set the debit recording policy.
    pub fn with_debit_recording(mut self, policy: DebitRecording) -> Self {
        self.debit_recording = policy;
        self
    }
}
