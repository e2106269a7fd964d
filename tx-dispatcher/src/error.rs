//! Error type shared by the queue store, the network adapters and the dispatch pass.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug)]
pub enum DispatchError {
    /// Malformed enqueue input; the store was not touched
    Validation { field: &'static str, reason: String },
    /// The queue file exists but cannot be parsed
    QueueCorruption { path: PathBuf, reason: String },
    /// Another process held a lock past the configured bound
    LockTimeout {
        path: PathBuf,
        waited: Duration,
        holder_pid: Option<u32>,
    },
    /// Nonce fetch or broadcast failed (timeout, refused, malformed response)
    Network(String),
    /// Key material invalid or the signer failed
    Signing(String),
    /// The queue file or its directory could not be read or written
    Io { path: PathBuf, source: io::Error },
    /// Invalid configuration value
    Config(String),
}

impl DispatchError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        DispatchError::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        DispatchError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether running the same command again later can succeed without operator action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DispatchError::LockTimeout { .. } | DispatchError::Network(_)
        )
    }
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::Validation { field, reason } => {
                write!(f, "Invalid --{}: {}", field.replace('_', "-"), reason)
            }
            DispatchError::QueueCorruption { path, reason } => write!(
                f,
                "Queue file {} is corrupted ({}). Inspect it or restore it from a backup; it will not be repaired automatically",
                path.display(),
                reason
            ),
            DispatchError::LockTimeout {
                path,
                waited,
                holder_pid,
            } => {
                if let Some(pid) = holder_pid {
                    write!(
                        f,
                        "Timed out after {}ms waiting for lock {} held by process {}; retry later",
                        waited.as_millis(),
                        path.display(),
                        pid
                    )
                } else {
                    write!(
                        f,
                        "Timed out after {}ms waiting for lock {}; retry later",
                        waited.as_millis(),
                        path.display()
                    )
                }
            }
            DispatchError::Network(msg) => write!(f, "Network error: {}", msg),
            DispatchError::Signing(msg) => write!(f, "Signing error: {}", msg),
            DispatchError::Io { path, source } => {
                write!(f, "Queue store {} unavailable: {}", path.display(), source)
            }
            DispatchError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
