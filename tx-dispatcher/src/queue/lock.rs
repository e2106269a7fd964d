//! Advisory file locks serializing queue access across processes.
//!
//! Uses `fs2` (flock on Unix, LockFileEx on Windows). Locks belong to the open
//! file handle, so two handles in the same process contend like two processes.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::DispatchError;

const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(10);
const MAX_RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Readers; any number may hold it together
    Shared,
    /// Writers and dispatch passes
    Exclusive,
}

/// A held lock, released on drop.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl FileLock {
    /// Acquire the lock at `path`, retrying with exponential backoff until `timeout`.
    ///
    /// The lock file is created if missing. Exclusive holders write their PID into
    /// it so a timed-out waiter can report who is blocking.
    pub fn acquire(path: &Path, mode: LockMode, timeout: Duration) -> Result<Self, DispatchError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| DispatchError::io(parent, e))?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| DispatchError::io(path, e))?;

        let started = Instant::now();
        let deadline = started + timeout;
        let mut retry_delay = INITIAL_RETRY_DELAY;

        loop {
            let attempt = match mode {
                LockMode::Shared => FileExt::try_lock_shared(&file),
                LockMode::Exclusive => FileExt::try_lock_exclusive(&file),
            };

            match attempt {
                Ok(()) => break,
                Err(e) if is_contended(&e) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(DispatchError::LockTimeout {
                            path: path.to_path_buf(),
                            waited: now - started,
                            holder_pid: read_holder_pid(path),
                        });
                    }
                    thread::sleep(retry_delay.min(deadline - now));
                    retry_delay = (retry_delay * 2).min(MAX_RETRY_DELAY);
                }
                Err(e) => return Err(DispatchError::io(path, e)),
            }
        }

        if mode == LockMode::Exclusive {
            let mut handle = &file;
            handle
                .set_len(0)
                .and_then(|_| writeln!(handle, "{}", std::process::id()))
                .map_err(|e| DispatchError::io(path, e))?;
        }

        log::debug!("[QUEUE] Acquired {:?} lock {}", mode, path.display());

        Ok(Self {
            file,
            path: path.to_path_buf(),
            mode,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if self.mode == LockMode::Exclusive {
            let _ = self.file.set_len(0);
        }
        // The lock file itself stays: removing it would let a waiter lock an unlinked inode.
        let _ = FileExt::unlock(&self.file);
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

fn read_holder_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
}
