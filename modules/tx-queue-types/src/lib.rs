//! Shared types for the transaction dispatcher queue file and its dispatch results.
//!
//! The queue file is plain JSON so operators (and other tools) can inspect it
//! without going through the dispatcher binary.

use serde::{Deserialize, Serialize};

/// Current on-disk format version of the queue file
pub const QUEUE_FILE_VERSION: u32 = 1;

// =====================================================
// Queue Types
// =====================================================

/// A transaction waiting for a dispatch pass.
///
/// No nonce is stored here: nonces are assigned only while a pass runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedTransaction {
    /// Monotonic sequence number, establishes FIFO order
    pub sequence: u64,
    /// Recipient address
    pub receiver: String,
    /// Amount as a decimal integer string (can exceed u64)
    pub value: String,
    pub gas_price: u64,
    pub gas_limit: u64,
    /// Either `0x`-prefixed hex or a plain UTF-8 payload, empty when unset
    #[serde(default)]
    pub data: String,
    /// Wall-clock enqueue time (RFC 3339), informational only
    pub queued_at: String,
}

/// The persisted queue document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueFile {
    pub version: u32,
    /// Sequence number handed to the next enqueued transaction
    pub next_sequence: u64,
    pub transactions: Vec<QueuedTransaction>,
}

impl QueueFile {
    pub fn empty() -> Self {
        Self {
            version: QUEUE_FILE_VERSION,
            next_sequence: 0,
            transactions: Vec::new(),
        }
    }

    /// Check the structural invariants a well-formed file must hold.
    pub fn check_integrity(&self) -> Result<(), String> {
        if self.version != QUEUE_FILE_VERSION {
            return Err(format!(
                "unsupported queue file version {} (expected {})",
                self.version, QUEUE_FILE_VERSION
            ));
        }

        let mut previous: Option<u64> = None;
        for tx in &self.transactions {
            if let Some(prev) = previous {
                if tx.sequence <= prev {
                    return Err(format!(
                        "sequence numbers out of order ({} follows {})",
                        tx.sequence, prev
                    ));
                }
            }
            if tx.sequence >= self.next_sequence {
                return Err(format!(
                    "sequence {} is not below next_sequence {}",
                    tx.sequence, self.next_sequence
                ));
            }
            previous = Some(tx.sequence);
        }

        Ok(())
    }
}

impl Default for QueueFile {
    fn default() -> Self {
        Self::empty()
    }
}

// =====================================================
// Dispatch Results
// =====================================================

/// Result of broadcasting one queued transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The network endpoint accepted the transaction
    Accepted { tx_hash: String },
    /// Signing or broadcasting failed; the pass stopped here
    Failed { error: String },
}

/// Per-transaction outcome produced by a dispatch pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub sequence: u64,
    pub receiver: String,
    /// Nonce assigned for this attempt (never persisted in the queue)
    pub nonce: u64,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl DispatchOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self.status, OutcomeStatus::Accepted { .. })
    }

    pub fn tx_hash(&self) -> Option<&str> {
        match &self.status {
            OutcomeStatus::Accepted { tx_hash } => Some(tx_hash),
            OutcomeStatus::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            OutcomeStatus::Accepted { .. } => None,
            OutcomeStatus::Failed { error } => Some(error),
        }
    }
}

impl std::fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.status {
            OutcomeStatus::Accepted { tx_hash } => write!(
                f,
                "#{} -> {} nonce={} accepted {}",
                self.sequence, self.receiver, self.nonce, tx_hash
            ),
            OutcomeStatus::Failed { error } => write!(
                f,
                "#{} -> {} nonce={} FAILED: {}",
                self.sequence, self.receiver, self.nonce, error
            ),
        }
    }
}
