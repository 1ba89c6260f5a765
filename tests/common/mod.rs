#![allow(dead_code)]

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use certifier::chain::abi::{self, CERTIFICATE_COUNT, REGISTER_CERTIFICATE, VERIFY_CERTIFICATE};
use certifier::chain::signer::Signer;
use certifier::chain::{keccak256, CertificateRegistry, ContractClient};
use certifier::config::Config;
use certifier::ledger::Ledger;
use certifier::observability::{metrics::Metrics, Logger};
use certifier::server::{router, AppState};
use certifier::service::CertificateService;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

pub const TEST_KEY: &str = "0x4646464646464646464646464646464646464646464646464646464646464646";
pub const CONTRACT: &str = "0x3535353535353535353535353535353535353535";
pub const PASSWORD: &str = "s3cret";
pub const CHAIN_ID: u64 = 1337;
pub const REGISTERED_AT: u64 = 1_700_000_000;

/// In-memory stand-in for the registry contract behind a JSON-RPC node.
#[derive(Default)]
pub struct MockChain {
    pub chain_id: u64,
    /// hash hex (no prefix) -> (id, timestamp)
    pub certs: HashMap<String, (u64, u64)>,
    pub issuer: String,
    pub nonce: u64,
    pub raw_txs: Vec<String>,
    pub receipts: HashMap<String, Value>,
    pub revert: bool,
    /// Receipt lookups answer `null` forever.
    pub withhold_receipts: bool,
    /// Receipt lookups are answered after this delay.
    pub receipt_delay_ms: u64,
    /// The first send is accepted but answered with HTTP 502.
    pub drop_first_send_reply: bool,
    pub send_attempts: usize,
}

pub struct MockNode {
    pub url: String,
    pub chain: Arc<Mutex<MockChain>>,
}

fn word(v: u64) -> String {
    format!("{:064x}", v)
}

fn rpc_error(req: &Value, message: &str) -> Response {
    Json(json!({"jsonrpc": "2.0", "id": req["id"], "error": {"code": -32601, "message": message}})).into_response()
}

async fn handle(State(chain): State<Arc<Mutex<MockChain>>>, Json(req): Json<Value>) -> Response {
    let method = req["method"].as_str().unwrap_or_default().to_string();
    let params = req["params"].clone();

    if method == "eth_getTransactionReceipt" {
        let delay = chain.lock().unwrap().receipt_delay_ms;
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
    }
    let mut chain = chain.lock().unwrap();

    let result = match method.as_str() {
        "eth_chainId" => json!(format!("0x{:x}", chain.chain_id)),
        "eth_blockNumber" => json!("0x10"),
        "eth_getTransactionCount" => json!(format!("0x{:x}", chain.nonce)),
        "eth_call" => {
            let data = params[0]["data"].as_str().unwrap_or_default().trim_start_matches("0x").to_string();
            let verify_sel = hex::encode(abi::selector(VERIFY_CERTIFICATE));
            let count_sel = hex::encode(abi::selector(CERTIFICATE_COUNT));
            if let Some(hash) = data.strip_prefix(&verify_sel) {
                match chain.certs.get(hash) {
                    Some((id, ts)) => json!(format!(
                        "0x{}{}{:0>64}{}",
                        word(1),
                        word(*id),
                        chain.issuer,
                        word(*ts)
                    )),
                    None => json!(format!("0x{}", "0".repeat(256))),
                }
            } else if data == count_sel {
                json!(format!("0x{}", word(chain.certs.len() as u64)))
            } else {
                return rpc_error(&req, "unknown selector");
            }
        }
        "eth_sendRawTransaction" => {
            let raw = params[0].as_str().unwrap_or_default().trim_start_matches("0x").to_string();
            chain.send_attempts += 1;
            if chain.raw_txs.contains(&raw) {
                return rpc_error(&req, "already known");
            }
            let register_sel = hex::encode(abi::selector(REGISTER_CERTIFICATE));
            let start = match raw.match_indices(&register_sel).find(|(i, _)| i % 2 == 0) {
                Some((i, _)) => i + register_sel.len(),
                None => return rpc_error(&req, "not a registerCertificate call"),
            };
            let hash = raw[start..start + 64].to_string();

            chain.nonce += 1;
            let tx_hash = format!("0x{}", hex::encode(keccak256(&hex::decode(&raw).unwrap_or_default())));
            let status = if chain.revert {
                "0x0"
            } else {
                let id = chain.certs.len() as u64 + 1;
                chain.certs.insert(hash, (id, REGISTERED_AT));
                "0x1"
            };
            chain.receipts.insert(tx_hash.clone(), json!({
                "transactionHash": tx_hash,
                "status": status,
                "blockNumber": "0x11",
                "gasUsed": "0xb4d2",
            }));
            chain.raw_txs.push(raw);
            if chain.drop_first_send_reply && chain.send_attempts == 1 {
                return (StatusCode::BAD_GATEWAY, "upstream reply lost").into_response();
            }
            json!(tx_hash)
        }
        "eth_getTransactionReceipt" if chain.withhold_receipts => Value::Null,
        "eth_getTransactionReceipt" => chain
            .receipts
            .get(params[0].as_str().unwrap_or_default())
            .cloned()
            .unwrap_or(Value::Null),
        _ => return rpc_error(&req, "method not found"),
    };

    Json(json!({"jsonrpc": "2.0", "id": req["id"], "result": result})).into_response()
}

pub fn issuer_address() -> String {
    Signer::from_hex(TEST_KEY).unwrap().address().to_string()
}

pub async fn spawn_node() -> MockNode {
    let chain = Arc::new(Mutex::new(MockChain {
        chain_id: CHAIN_ID,
        issuer: issuer_address().trim_start_matches("0x").to_string(),
        ..Default::default()
    }));
    let app = Router::new().route("/", post(handle)).with_state(chain.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    MockNode { url: format!("http://127.0.0.1:{}", port), chain }
}

pub fn test_config(rpc_url: &str, dir: &Path) -> Config {
    Config {
        rpc_url: rpc_url.to_string(),
        private_key: TEST_KEY.to_string(),
        account_address: issuer_address(),
        contract_address: CONTRACT.to_string(),
        contract_abi_path: None,
        chain_id: Some(CHAIN_ID),
        register_password: PASSWORD.to_string(),
        http_bind: "127.0.0.1:0".to_string(),
        upload_dir: dir.join("uploads").to_string_lossy().to_string(),
        issuers_path: dir.join("issuers.json").to_string_lossy().to_string(),
        gas_limit: 300_000,
        gas_price_gwei: 15,
        receipt_timeout_ms: 5_000,
        receipt_poll_interval_ms: 50,
        rpc_max_retries: 0,
        max_upload_bytes: 1024 * 1024,
        instance_id: "certifier-test".to_string(),
    }
}

pub struct TestApp {
    pub url: String,
    pub node: MockNode,
    pub dir: tempfile::TempDir,
    pub readiness: Arc<AtomicBool>,
    pub metrics: Arc<Metrics>,
}

pub async fn spawn_app(ready: bool) -> TestApp {
    spawn_app_with(ready, |_| {}).await
}

pub async fn spawn_app_with(ready: bool, adjust: impl FnOnce(&mut Config)) -> TestApp {
    let node = spawn_node().await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&node.url, dir.path());
    adjust(&mut config);

    let metrics = Arc::new(Metrics::new());
    let logger = Logger::new(config.instance_id.clone());
    let registry: Arc<dyn CertificateRegistry> =
        Arc::new(ContractClient::from_config(&config, (*metrics).clone()).unwrap());
    let service = Arc::new(CertificateService::new(
        registry,
        Ledger::open(&config.issuers_path),
        dir.path().join("uploads"),
        config.register_password.clone(),
        metrics.clone(),
        logger,
    ));
    let readiness = Arc::new(AtomicBool::new(ready));
    let state = AppState {
        service,
        metrics: metrics.clone(),
        readiness: readiness.clone(),
        version: "test".to_string(),
        max_upload_bytes: config.max_upload_bytes,
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });

    TestApp { url: format!("http://127.0.0.1:{}", port), node, dir, readiness, metrics }
}
