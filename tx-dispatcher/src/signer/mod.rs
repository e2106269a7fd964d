//! Signer Adapter
//!
//! Hands a draft transaction to the signing capability and gets back raw bytes
//! ready for broadcast. `WalletSigner` is the key-file backed implementation.

mod key_file;
mod wallet;

pub use key_file::parse_key_material;
pub use wallet::WalletSigner;

use async_trait::async_trait;
use tx_queue_types::QueuedTransaction;

use crate::error::DispatchError;

/// A queued transaction with its nonce assigned for this pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftTransaction {
    pub sequence: u64,
    pub receiver: String,
    pub value: String,
    pub nonce: u64,
    pub gas_price: u64,
    pub gas_limit: u64,
    pub data: String,
}

impl DraftTransaction {
    pub fn from_queued(tx: &QueuedTransaction, nonce: u64) -> Self {
        Self {
            sequence: tx.sequence,
            receiver: tx.receiver.clone(),
            value: tx.value.clone(),
            nonce,
            gas_price: tx.gas_price,
            gas_limit: tx.gas_limit,
            data: tx.data.clone(),
        }
    }
}

/// Broadcast-ready transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub sequence: u64,
    pub nonce: u64,
    /// Encoded signed transaction as submitted to the network
    pub raw: Vec<u8>,
    /// Locally computed transaction hash (0x-prefixed)
    pub hash: String,
}

#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Sender address whose nonce the pass fetches.
    fn address(&self) -> String;

    async fn sign(&self, draft: &DraftTransaction) -> Result<SignedTransaction, DispatchError>;
}
