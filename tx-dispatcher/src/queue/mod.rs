//! Queue Store
//!
//! The durable, ordered record of transactions awaiting dispatch.
//!
//! ## Files
//! - `queue.json` - the queue itself (pretty-printed JSON, one object per transaction)
//! - `queue.json.lock` - store lock, held for every read (shared) and rewrite (exclusive)
//! - `queue.json.dispatch.lock` - held by a dispatch pass from nonce fetch to last removal

mod lock;
mod request;
mod store;

pub use lock::{FileLock, LockMode};
pub use request::{EnqueueRequest, ValidatedTransfer, decode_payload, parse_address};
pub use store::QueueStore;
