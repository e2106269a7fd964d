//! Network boundary: the account nonce lookup and the broadcast endpoint.
//!
//! The dispatch pass only sees the two traits below; `ProxyClient` implements
//! both against a JSON-RPC proxy.

mod proxy;
mod rpc;

pub use proxy::{ProxyClient, parse_quantity};
pub use rpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};

use async_trait::async_trait;

use crate::error::DispatchError;
use crate::signer::SignedTransaction;

/// Resolves the sender's current nonce. Called once at the start of every pass.
#[async_trait]
pub trait NonceSource: Send + Sync {
    async fn current_nonce(&self, address: &str) -> Result<u64, DispatchError>;
}

/// Submits a signed transaction and returns its hash once the endpoint accepts it.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn broadcast(&self, tx: &SignedTransaction) -> Result<String, DispatchError>;
}
