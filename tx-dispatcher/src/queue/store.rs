//! Durable FIFO queue backed by a single JSON file.
//!
//! Every mutation runs under the exclusive store lock and rewrites the whole
//! file through a temp file + fsync + rename, so readers and crashed writers
//! only ever observe a complete document.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tx_queue_types::{QueueFile, QueuedTransaction};

use super::lock::{FileLock, LockMode};
use super::request::EnqueueRequest;
use crate::config::DispatcherConfig;
use crate::error::DispatchError;

#[derive(Debug, Clone)]
pub struct QueueStore {
    path: PathBuf,
    lock_timeout: Duration,
    default_gas_price: u64,
}

impl QueueStore {
    /// Store at the configured queue path
    pub fn new(config: &DispatcherConfig) -> Self {
        Self::open(&config.queue_path, config.lock_timeout, config.default_gas_price)
    }

    /// Store at an explicit path; nothing is touched until the first access
    pub fn open(path: impl Into<PathBuf>, lock_timeout: Duration, default_gas_price: u64) -> Self {
        Self {
            path: path.into(),
            lock_timeout,
            default_gas_price,
        }
    }

    /// Location of the queue file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validate and append one transaction. Invalid input never touches the file.
    pub fn enqueue(&self, request: EnqueueRequest) -> Result<QueuedTransaction, DispatchError> {
        let validated = request.validate(self.default_gas_price)?;

        let queued = self.mutate(|file| {
            let tx = QueuedTransaction {
                sequence: file.next_sequence,
                receiver: validated.receiver,
                value: validated.value,
                gas_price: validated.gas_price,
                gas_limit: validated.gas_limit,
                data: validated.data,
                queued_at: Utc::now().to_rfc3339(),
            };
            file.next_sequence += 1;
            file.transactions.push(tx.clone());
            (tx, true)
        })?;

        log::info!(
            "[QUEUE] Enqueued #{} to {} (value={}, gas_limit={}, gas_price={})",
            queued.sequence,
            queued.receiver,
            queued.value,
            queued.gas_limit,
            queued.gas_price
        );
        Ok(queued)
    }

    /// The whole queue in FIFO order.
    pub fn read_all(&self) -> Result<Vec<QueuedTransaction>, DispatchError> {
        let _lock = self.lock(LockMode::Shared)?;
        Ok(self.load()?.transactions)
    }

    /// True for a missing file or an empty queue
    pub fn is_empty(&self) -> Result<bool, DispatchError> {
        if !self.path.exists() {
            return Ok(true);
        }
        Ok(self.read_all()?.is_empty())
    }

    /// Delete the first `prefix_count` entries, keeping the rest in order.
    /// Returns how many were actually removed.
    pub fn remove(&self, prefix_count: usize) -> Result<usize, DispatchError> {
        if prefix_count == 0 {
            return Ok(0);
        }

        let removed = self.mutate(|file| {
            let count = prefix_count.min(file.transactions.len());
            file.transactions.drain(..count);
            (count, count > 0)
        })?;

        log::debug!("[QUEUE] Removed {} dispatched entries", removed);
        Ok(removed)
    }

    /// Remove the head entry only if it is still the one with `sequence`.
    ///
    /// Returns false (and leaves the file alone) when the head changed underneath
    /// the caller, e.g. after a concurrent `clean`.
    pub fn remove_head_if(&self, sequence: u64) -> Result<bool, DispatchError> {
        self.mutate(|file| match file.transactions.first() {
            Some(head) if head.sequence == sequence => {
                file.transactions.remove(0);
                (true, true)
            }
            _ => (false, false),
        })
    }

    /// Drop every queued transaction. Idempotent.
    pub fn clear(&self) -> Result<usize, DispatchError> {
        self.mutate(|file| {
            let count = file.transactions.len();
            file.transactions.clear();
            (count, count > 0)
        })
    }

    /// Exclusive per-account lock held for the duration of a dispatch pass.
    ///
    /// Kept separate from the store lock so `enqueue` only waits for short
    /// rewrites, not for a whole pass.
    pub fn lock_for_dispatch(&self) -> Result<FileLock, DispatchError> {
        FileLock::acquire(&self.sidecar("dispatch.lock"), LockMode::Exclusive, self.lock_timeout)
    }

    fn lock(&self, mode: LockMode) -> Result<FileLock, DispatchError> {
        FileLock::acquire(&self.sidecar("lock"), mode, self.lock_timeout)
    }

    fn sidecar(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "queue".into());
        name.push(".");
        name.push(suffix);
        self.path.with_file_name(name)
    }

    /// Load, apply `f`, and persist when `f` reports a change, all under the store lock.
    fn mutate<R, F>(&self, f: F) -> Result<R, DispatchError>
    where
        F: FnOnce(&mut QueueFile) -> (R, bool),
    {
        let _lock = self.lock(LockMode::Exclusive)?;
        let mut file = self.load()?;
        let (result, changed) = f(&mut file);
        if changed {
            self.persist(&file)?;
        }
        Ok(result)
    }

    fn load(&self) -> Result<QueueFile, DispatchError> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(QueueFile::empty()),
            Err(e) => return Err(DispatchError::io(&self.path, e)),
        };

        let file: QueueFile =
            serde_json::from_slice(&bytes).map_err(|e| DispatchError::QueueCorruption {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        file.check_integrity()
            .map_err(|reason| DispatchError::QueueCorruption {
                path: self.path.clone(),
                reason,
            })?;

        Ok(file)
    }

    fn persist(&self, file: &QueueFile) -> Result<(), DispatchError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| DispatchError::io(&dir, e))?;

        let mut json = serde_json::to_vec_pretty(file).map_err(|e| {
            DispatchError::io(&self.path, io::Error::new(io::ErrorKind::InvalidData, e))
        })?;
        json.push(b'\n');

        let mut temp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| DispatchError::io(&dir, e))?;
        temp.write_all(&json)
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| DispatchError::io(temp.path(), e))?;
        temp.persist(&self.path)
            .map_err(|e| DispatchError::io(&self.path, e.error))?;

        sync_dir(&dir);
        Ok(())
    }
}

/// Make the rename itself durable. Directories cannot be opened this way on Windows.
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        log::warn!("[QUEUE] Failed to sync directory {}: {}", dir.display(), e);
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}
