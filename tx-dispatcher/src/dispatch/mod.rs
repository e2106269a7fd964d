//! Dispatch Subsystem
//!
//! ## Flow
//! 1. `Dispatcher::run_pass` drains the queue once: nonce fetch, then sign and
//!    broadcast in FIFO order until the first failure
//! 2. `run_continuously` repeats passes on an interval until cancelled
//! 3. `clean` empties the queue without touching the network

mod continuous;
mod pass;

pub use continuous::{Clock, LoopSummary, TokioClock, run_continuously};
pub use pass::{Dispatcher, FailureKind, PassReport};

use crate::error::DispatchError;
use crate::queue::QueueStore;

/// Empty the queue unconditionally. Does not wait for an in-flight pass.
pub fn clean(store: &QueueStore) -> Result<usize, DispatchError> {
    let removed = store.clear()?;
    if removed > 0 {
        log::info!("[QUEUE] Cleaned {} queued transactions", removed);
    } else {
        log::info!("[QUEUE] Queue already empty");
    }
    Ok(removed)
}
