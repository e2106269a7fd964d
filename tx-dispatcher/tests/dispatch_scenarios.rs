//! End-to-end passes through the real signer and JSON-RPC client against an
//! in-process mock ledger.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ethers::types::Transaction;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use tx_dispatcher::{
    Dispatcher, EnqueueRequest, OutcomeStatus, ProxyClient, QueueStore, TransactionSigner, WalletSigner,
};

// Hardhat account #0 (DO NOT USE IN PRODUCTION)
const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const SENDER: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
const RECEIVER: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";
const CHAIN_ID: u64 = 31337;

#[derive(Default)]
struct Ledger {
    nonce: u64,
    rejected_gas_limits: HashSet<u64>,
    accepted: Vec<(u64, u64)>,
    nonce_queries: usize,
}

impl Ledger {
    fn handle(&mut self, request: &Value) -> Value {
        let id = request["id"].clone();
        match request["method"].as_str() {
            Some("eth_getTransactionCount") => {
                assert_eq!(request["params"][0], SENDER);
                assert_eq!(request["params"][1], "pending");
                self.nonce_queries += 1;
                json!({"jsonrpc": "2.0", "id": id, "result": format!("0x{:x}", self.nonce)})
            }
            Some("eth_sendRawTransaction") => {
                let raw_hex = request["params"][0].as_str().unwrap_or_default();
                let raw = hex::decode(raw_hex.trim_start_matches("0x")).unwrap();
                let tx: Transaction = ethers::utils::rlp::decode(&raw).unwrap();
                let nonce = tx.nonce.as_u64();
                let gas_limit = tx.gas.as_u64();

                if nonce != self.nonce {
                    return rpc_error(id, &format!("nonce {} does not match account nonce {}", nonce, self.nonce));
                }
                if self.rejected_gas_limits.contains(&gas_limit) {
                    return rpc_error(id, "insufficient funds for gas * price + value");
                }

                self.nonce += 1;
                self.accepted.push((nonce, gas_limit));
                json!({"jsonrpc": "2.0", "id": id, "result": format!("{:?}", tx.hash)})
            }
            _ => rpc_error(id, "method not found"),
        }
    }
}

fn rpc_error(id: Value, message: &str) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "error": {"code": -32000, "message": message}})
}

async fn read_body(stream: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
            let len = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= pos + 4 + len {
                return Some(String::from_utf8_lossy(&buf[pos + 4..pos + 4 + len]).to_string());
            }
        }
    }
}

/// Serve the ledger over HTTP, one request per connection.
async fn serve(ledger: Arc<Mutex<Ledger>>) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let ledger = ledger.clone();
            tokio::spawn(async move {
                let Some(body) = read_body(&mut stream).await else {
                    return;
                };
                let request: Value = serde_json::from_str(&body).unwrap();
                let response = ledger.lock().unwrap().handle(&request).to_string();
                let reply = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    response.len(),
                    response
                );
                let _ = stream.write_all(reply.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    (url, handle)
}

fn store_at(path: &Path) -> QueueStore {
    QueueStore::open(path, Duration::from_secs(10), 1_000_000_000)
}

fn enqueue(store: &QueueStore, gas_limit: u64) {
    store
        .enqueue(EnqueueRequest {
            receiver: RECEIVER.to_string(),
            value: Some("1000".to_string()),
            gas_limit: gas_limit.to_string(),
            ..Default::default()
        })
        .unwrap();
}

fn dispatcher(store: QueueStore, url: &str) -> Dispatcher {
    let signer = Arc::new(WalletSigner::from_private_key(TEST_KEY, CHAIN_ID).unwrap());
    assert_eq!(signer.address(), SENDER);
    let proxy = Arc::new(ProxyClient::new(url.to_string(), Duration::from_secs(5)).unwrap());
    Dispatcher::new(store, proxy.clone(), signer, proxy)
}

#[tokio::test]
async fn test_failure_keeps_unsent_suffix_and_next_pass_refetches_nonce() {
    let ledger = Arc::new(Mutex::new(Ledger {
        nonce: 5,
        rejected_gas_limits: HashSet::from([70_000]),
        ..Default::default()
    }));
    let (url, server) = serve(ledger.clone()).await;

    let dir = tempfile::tempdir().unwrap();
    let store = store_at(&dir.path().join("queue.json"));
    for gas_limit in [50_000, 60_000, 70_000] {
        enqueue(&store, gas_limit);
    }
    let dispatcher = dispatcher(store.clone(), &url);

    let report = dispatcher.run_pass().await.unwrap();
    assert_eq!(report.starting_nonce, Some(5));
    assert_eq!(report.accepted(), 2);
    let nonces: Vec<u64> = report.outcomes.iter().map(|o| o.nonce).collect();
    assert_eq!(nonces, vec![5, 6, 7]);
    assert!(matches!(report.outcomes[2].status, OutcomeStatus::Failed { .. }));

    let left = store.read_all().unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].gas_limit, 70_000);
    assert_eq!(ledger.lock().unwrap().accepted, vec![(5, 50_000), (6, 60_000)]);

    ledger.lock().unwrap().rejected_gas_limits.clear();

    let report = dispatcher.run_pass().await.unwrap();
    assert_eq!(report.starting_nonce, Some(7));
    assert_eq!(report.accepted(), 1);
    assert!(report.failure().is_none());
    assert!(store.is_empty().unwrap());

    let ledger = ledger.lock().unwrap();
    assert_eq!(ledger.accepted.last(), Some(&(7, 70_000)));
    assert_eq!(ledger.nonce_queries, 2);
    drop(ledger);
    server.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_passes_never_reuse_a_nonce() {
    let ledger = Arc::new(Mutex::new(Ledger {
        nonce: 40,
        ..Default::default()
    }));
    let (url, server) = serve(ledger.clone()).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue.json");
    let store = store_at(&path);
    for i in 0..6 {
        enqueue(&store, 21_000 + i);
    }

    // Two independent dispatchers over the same queue file, as two processes would be
    let first = dispatcher(store_at(&path), &url);
    let second = dispatcher(store_at(&path), &url);
    let (a, b) = tokio::join!(first.run_pass(), second.run_pass());
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(a.failure().is_none());
    assert!(b.failure().is_none());
    assert_eq!(a.accepted() + b.accepted(), 6);

    let accepted = ledger.lock().unwrap().accepted.clone();
    let nonces: Vec<u64> = accepted.iter().map(|(nonce, _)| *nonce).collect();
    assert_eq!(nonces, (40..46).collect::<Vec<_>>());
    let gas_limits: Vec<u64> = accepted.iter().map(|(_, gas)| *gas).collect();
    assert_eq!(gas_limits, (21_000..21_006).collect::<Vec<_>>());

    assert!(store.is_empty().unwrap());
    server.abort();
}

#[tokio::test]
async fn test_work_enqueued_after_clean_is_dispatched_in_order() {
    let ledger = Arc::new(Mutex::new(Ledger::default()));
    let (url, server) = serve(ledger.clone()).await;

    let dir = tempfile::tempdir().unwrap();
    let store = store_at(&dir.path().join("queue.json"));
    enqueue(&store, 30_000);
    enqueue(&store, 30_001);
    assert_eq!(tx_dispatcher::clean(&store).unwrap(), 2);

    enqueue(&store, 30_002);
    enqueue(&store, 30_003);
    let sequences: Vec<u64> = store.read_all().unwrap().iter().map(|t| t.sequence).collect();
    assert_eq!(sequences, vec![2, 3]);

    let report = dispatcher(store.clone(), &url).run_pass().await.unwrap();
    assert_eq!(report.accepted(), 2);
    assert_eq!(ledger.lock().unwrap().accepted, vec![(0, 30_002), (1, 30_003)]);
    assert!(store.is_empty().unwrap());
    server.abort();
}
