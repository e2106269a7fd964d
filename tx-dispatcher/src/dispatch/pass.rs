//! One drain of the queue: fetch nonce, then sign and broadcast in FIFO order,
//! stopping at the first failure.

use std::sync::Arc;

use tx_queue_types::{DispatchOutcome, OutcomeStatus};

use crate::error::DispatchError;
use crate::network::{Broadcaster, NonceSource};
use crate::queue::QueueStore;
use crate::signer::{DraftTransaction, TransactionSigner};

/// Which step ended a pass early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Signing,
    Broadcast,
}

/// What a single pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Nonce fetched at the start of the pass; `None` when the queue was empty
    pub starting_nonce: Option<u64>,
    /// One entry per attempted transaction, in attempt order
    pub outcomes: Vec<DispatchOutcome>,
    /// Set when the last outcome is a failure
    pub failure_kind: Option<FailureKind>,
}

impl PassReport {
    /// Number of transactions the endpoint accepted
    pub fn accepted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_accepted()).count()
    }

    /// The outcome that ended the pass, if any
    pub fn failure(&self) -> Option<&DispatchOutcome> {
        self.outcomes.iter().find(|o| !o.is_accepted())
    }

    /// True when the queue was empty and nothing was attempted
    pub fn is_noop(&self) -> bool {
        self.outcomes.is_empty()
    }
}

pub struct Dispatcher {
    store: QueueStore,
    nonce_source: Arc<dyn NonceSource>,
    signer: Arc<dyn TransactionSigner>,
    broadcaster: Arc<dyn Broadcaster>,
}

impl Dispatcher {
    pub fn new(
        store: QueueStore,
        nonce_source: Arc<dyn NonceSource>,
        signer: Arc<dyn TransactionSigner>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Self {
        Self {
            store,
            nonce_source,
            signer,
            broadcaster,
        }
    }

    /// Run one dispatch pass.
    ///
    /// Holds the dispatch lock from snapshot to the last queue update. A failed
    /// sign or broadcast is reported as a failed outcome and ends the pass with
    /// `Ok`; errors that prevent any attempt (lock, store, nonce fetch) are `Err`.
    pub async fn run_pass(&self) -> Result<PassReport, DispatchError> {
        let _pass_lock = self.with_store(|store| store.lock_for_dispatch()).await?;

        let snapshot = self.with_store(|store| store.read_all()).await?;
        if snapshot.is_empty() {
            log::debug!("[DISPATCH] Queue empty, nothing to dispatch");
            return Ok(PassReport::default());
        }

        let sender = self.signer.address();
        let starting_nonce = self.nonce_source.current_nonce(&sender).await?;
        if starting_nonce.checked_add(snapshot.len() as u64 - 1).is_none() {
            return Err(DispatchError::Network(format!(
                "nonce overflow: account nonce {} leaves no room for {} queued transactions",
                starting_nonce,
                snapshot.len()
            )));
        }

        log::info!(
            "[DISPATCH] Dispatching {} queued transactions from {} starting at nonce {}",
            snapshot.len(),
            sender,
            starting_nonce
        );

        let mut report = PassReport {
            starting_nonce: Some(starting_nonce),
            outcomes: Vec::with_capacity(snapshot.len()),
            failure_kind: None,
        };

        for (offset, queued) in snapshot.iter().enumerate() {
            let nonce = starting_nonce + offset as u64;
            let draft = DraftTransaction::from_queued(queued, nonce);

            let attempt = match self.signer.sign(&draft).await {
                Ok(signed) => self
                    .broadcaster
                    .broadcast(&signed)
                    .await
                    .map_err(|e| (FailureKind::Broadcast, e)),
                Err(e) => Err((FailureKind::Signing, e)),
            };

            match attempt {
                Ok(tx_hash) => {
                    log::info!(
                        "[DISPATCH] #{} -> {} nonce={} accepted: {}",
                        queued.sequence,
                        queued.receiver,
                        nonce,
                        tx_hash
                    );
                    report.outcomes.push(DispatchOutcome {
                        sequence: queued.sequence,
                        receiver: queued.receiver.clone(),
                        nonce,
                        status: OutcomeStatus::Accepted {
                            tx_hash: tx_hash.clone(),
                        },
                    });

                    let sequence = queued.sequence;
                    match self.with_store(move |store| store.remove_head_if(sequence)).await {
                        Ok(true) => {}
                        Ok(false) => {
                            log::warn!(
                                "[DISPATCH] Queue changed during the pass (cleaned?); stopping after #{}",
                                queued.sequence
                            );
                            break;
                        }
                        Err(e) => {
                            log::error!(
                                "[DISPATCH] #{} was accepted as {} but could not be removed from the queue; remove it by hand before the next dispatch: {}",
                                queued.sequence,
                                tx_hash,
                                e
                            );
                            return Err(e);
                        }
                    }
                }
                Err((kind, e)) => {
                    log::warn!(
                        "[DISPATCH] #{} -> {} nonce={} failed, stopping pass: {}",
                        queued.sequence,
                        queued.receiver,
                        nonce,
                        e
                    );
                    report.outcomes.push(DispatchOutcome {
                        sequence: queued.sequence,
                        receiver: queued.receiver.clone(),
                        nonce,
                        status: OutcomeStatus::Failed {
                            error: e.to_string(),
                        },
                    });
                    report.failure_kind = Some(kind);
                    break;
                }
            }
        }

        log::info!(
            "[DISPATCH] Pass complete: {} accepted, {} left in queue",
            report.accepted(),
            snapshot.len() - report.accepted()
        );

        Ok(report)
    }

    /// Run a store operation off the async workers; lock waits sleep the thread.
    async fn with_store<R, F>(&self, f: F) -> Result<R, DispatchError>
    where
        F: FnOnce(&QueueStore) -> Result<R, DispatchError> + Send + 'static,
        R: Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| {
                DispatchError::io(
                    self.store.path(),
                    std::io::Error::other(format!("queue task failed: {}", e)),
                )
            })?
    }
}
