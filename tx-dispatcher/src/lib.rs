//! Durable, ordered transaction dispatcher.
//!
//! Transactions are queued locally in a JSON file and later broadcast with
//! consecutive account nonces, stopping at the first failure so the unsent
//! suffix keeps its order for the next pass.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod network;
pub mod queue;
pub mod signer;

pub use config::DispatcherConfig;
pub use dispatch::{Clock, Dispatcher, FailureKind, LoopSummary, PassReport, TokioClock, clean, run_continuously};
pub use error::DispatchError;
pub use network::{Broadcaster, NonceSource, ProxyClient};
pub use queue::{EnqueueRequest, QueueStore};
pub use signer::{DraftTransaction, SignedTransaction, TransactionSigner, WalletSigner};
pub use tx_queue_types::{DispatchOutcome, OutcomeStatus, QueuedTransaction};
