//! JSON-RPC client for the network proxy.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::rpc::{JsonRpcRequest, JsonRpcResponse};
use super::{Broadcaster, NonceSource};
use crate::error::DispatchError;
use crate::signer::SignedTransaction;

pub struct ProxyClient {
    client: Client,
    url: String,
    timeout: Duration,
    request_id: AtomicU64,
}

impl ProxyClient {
    /// Client for `url`; `timeout` bounds every request
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DispatchError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()
            .map_err(|e| DispatchError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            timeout,
            request_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn call<P, R>(&self, method: &str, params: P) -> Result<R, DispatchError>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let request = JsonRpcRequest::new(method, params, self.next_id());

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DispatchError::Network(format!(
                        "{} to {} timed out after {}ms",
                        method,
                        self.url,
                        self.timeout.as_millis()
                    ))
                } else if e.is_connect() {
                    DispatchError::Network(format!("Cannot connect to {}: {}", self.url, e))
                } else {
                    DispatchError::Network(format!("{} request failed: {}", method, e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DispatchError::Network(format!("Failed to read {} response: {}", method, e)))?;

        let rpc_response: JsonRpcResponse<R> = serde_json::from_str(&body).map_err(|e| {
            DispatchError::Network(format!(
                "Malformed {} response (HTTP {}): {}",
                method, status, e
            ))
        })?;

        if let Some(error) = rpc_response.error {
            return Err(DispatchError::Network(format!("{} rejected: {}", method, error)));
        }

        rpc_response
            .result
            .ok_or_else(|| DispatchError::Network(format!("{} response missing result", method)))
    }
}

#[async_trait]
impl NonceSource for ProxyClient {
    async fn current_nonce(&self, address: &str) -> Result<u64, DispatchError> {
        let raw: String = self
            .call("eth_getTransactionCount", json!([address, "pending"]))
            .await?;

        let nonce = parse_quantity(&raw)
            .map_err(|e| DispatchError::Network(format!("Malformed nonce '{}': {}", raw, e)))?;

        log::debug!("[PROXY] Nonce for {} is {}", address, nonce);
        Ok(nonce)
    }
}

#[async_trait]
impl Broadcaster for ProxyClient {
    async fn broadcast(&self, tx: &SignedTransaction) -> Result<String, DispatchError> {
        let raw_hex = format!("0x{}", hex::encode(&tx.raw));
        let tx_hash: String = self.call("eth_sendRawTransaction", json!([raw_hex])).await?;

        let valid = tx_hash.len() == 66
            && tx_hash.starts_with("0x")
            && tx_hash[2..].chars().all(|c| c.is_ascii_hexdigit());
        if !valid {
            return Err(DispatchError::Network(format!(
                "Malformed transaction hash in broadcast response: '{}'",
                tx_hash
            )));
        }

        if !tx_hash.eq_ignore_ascii_case(&tx.hash) {
            log::warn!(
                "[PROXY] Endpoint returned hash {} but the signed transaction hashes to {}",
                tx_hash,
                tx.hash
            );
        }

        Ok(tx_hash)
    }
}

/// Parse a JSON-RPC hex quantity such as `"0x1a"`.
pub fn parse_quantity(raw: &str) -> Result<u64, String> {
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| "missing 0x prefix".to_string())?;
    if digits.is_empty() {
        return Err("no digits".to_string());
    }
    u64::from_str_radix(digits, 16).map_err(|e| e.to_string())
}
