use std::path::PathBuf;
use std::time::Duration;

use crate::error::DispatchError;

pub mod env_vars {
    pub const QUEUE_PATH: &str = "TX_DISPATCHER_QUEUE_PATH";
    pub const DEFAULT_GAS_PRICE: &str = "TX_DISPATCHER_DEFAULT_GAS_PRICE";
    pub const CHAIN_ID: &str = "TX_DISPATCHER_CHAIN_ID";
    pub const LOCK_TIMEOUT_SECS: &str = "TX_DISPATCHER_LOCK_TIMEOUT_SECS";
    pub const RPC_TIMEOUT_SECS: &str = "TX_DISPATCHER_RPC_TIMEOUT_SECS";
}

pub const DEFAULT_QUEUE_PATH: &str = "./.tx-dispatcher/queue.json";
pub const DEFAULT_GAS_PRICE: u64 = 1_000_000_000;
pub const DEFAULT_CHAIN_ID: u64 = 1;
pub const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 30;

/// Settings passed explicitly to the queue store and the dispatch pass.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub queue_path: PathBuf,
    /// Used when `enqueue` is called without `--gas-price`
    pub default_gas_price: u64,
    pub chain_id: u64,
    /// Upper bound on waiting for the queue or dispatch lock
    pub lock_timeout: Duration,
    /// Per-request timeout for proxy calls
    pub rpc_timeout: Duration,
}

impl DispatcherConfig {
    /// Read settings from the process environment, falling back to defaults
    pub fn from_env() -> Result<Self, DispatchError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the process environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DispatchError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let queue_path = lookup(env_vars::QUEUE_PATH)
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_QUEUE_PATH));

        Ok(Self {
            queue_path,
            default_gas_price: parse_u64(&lookup, env_vars::DEFAULT_GAS_PRICE, DEFAULT_GAS_PRICE)?,
            chain_id: parse_u64(&lookup, env_vars::CHAIN_ID, DEFAULT_CHAIN_ID)?,
            lock_timeout: Duration::from_secs(parse_u64(
                &lookup,
                env_vars::LOCK_TIMEOUT_SECS,
                DEFAULT_LOCK_TIMEOUT_SECS,
            )?),
            rpc_timeout: Duration::from_secs(parse_u64(
                &lookup,
                env_vars::RPC_TIMEOUT_SECS,
                DEFAULT_RPC_TIMEOUT_SECS,
            )?),
        })
    }

    pub fn with_queue_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.queue_path = path.into();
        self
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_path: PathBuf::from(DEFAULT_QUEUE_PATH),
            default_gas_price: DEFAULT_GAS_PRICE,
            chain_id: DEFAULT_CHAIN_ID,
            lock_timeout: Duration::from_secs(DEFAULT_LOCK_TIMEOUT_SECS),
            rpc_timeout: Duration::from_secs(DEFAULT_RPC_TIMEOUT_SECS),
        }
    }
}

fn parse_u64<F>(lookup: &F, key: &str, default: u64) -> Result<u64, DispatchError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| DispatchError::Config(format!("{} must be a valid number, got '{}'", key, raw))),
        _ => Ok(default),
    }
}
