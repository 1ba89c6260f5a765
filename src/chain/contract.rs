use super::abi::{self, CERTIFICATE_COUNT, REGISTER_CERTIFICATE, VERIFY_CERTIFICATE};
use super::rpc::{parse_data, parse_quantity, RpcClient};
use super::signer::{LegacyTransaction, Signer};
use super::{Address, CertificateRegistry, ChainStatus, OnChainCertificate, TxReceipt};
use crate::config::Config;
use crate::error::ChainError;
use crate::hashing::CertificateHash;
use crate::observability::metrics::Metrics;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OnceCell};
use tokio::time::sleep;

/// Talks to the deployed certificate registry contract through a JSON-RPC
/// node, signing registrations locally with the configured key.
pub struct ContractClient {
    rpc: RpcClient,
    signer: Signer,
    contract: Address,
    configured_chain_id: Option<u64>,
    chain_id: OnceCell<u64>,
    gas_limit: u64,
    gas_price_wei: u128,
    receipt_timeout: Duration,
    poll_interval: Duration,
    // Held from nonce lookup until the receipt arrives.
    send_lock: Mutex<()>,
    metrics: Metrics,
}

impl ContractClient {
    pub fn from_config(config: &Config, metrics: Metrics) -> Result<Self, String> {
        let signer = Signer::from_hex(&config.private_key)?;
        let account = Address::parse(&config.account_address)?;
        if signer.address() != account {
            return Err(format!(
                "PRIVATE_KEY belongs to {}, not ACCOUNT_ADDRESS {}",
                signer.address(),
                account
            ));
        }
        let contract = Address::parse(&config.contract_address)?;

        Ok(Self {
            rpc: RpcClient::new(config.rpc_url.clone(), config.rpc_max_retries, metrics.clone()),
            signer,
            contract,
            configured_chain_id: config.chain_id,
            chain_id: OnceCell::new(),
            gas_limit: config.gas_limit,
            gas_price_wei: config.gas_price_wei(),
            receipt_timeout: Duration::from_millis(config.receipt_timeout_ms),
            poll_interval: Duration::from_millis(config.receipt_poll_interval_ms),
            send_lock: Mutex::new(()),
            metrics,
        })
    }

    async fn chain_id(&self) -> Result<u64, ChainError> {
        self.chain_id
            .get_or_try_init(|| async {
                let reported = parse_quantity(&self.rpc.call("eth_chainId", json!([])).await?)?;
                match self.configured_chain_id {
                    Some(expected) if expected != reported => Err(ChainError::permanent(format!(
                        "node reports chain id {}, CHAIN_ID is {}",
                        reported, expected
                    ))),
                    _ => Ok(reported),
                }
            })
            .await
            .copied()
    }

    async fn call_view(&self, data: Vec<u8>) -> Result<Vec<u8>, ChainError> {
        let params = json!([
            {
                "to": self.contract.to_string(),
                "data": format!("0x{}", hex::encode(data)),
            },
            "latest"
        ]);
        parse_data(&self.rpc.call("eth_call", params).await?)
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<Value, ChainError> {
        let started = Instant::now();
        loop {
            let receipt = self.rpc.call("eth_getTransactionReceipt", json!([tx_hash])).await?;
            if !receipt.is_null() {
                self.metrics.tx_confirmation_seconds.observe(started.elapsed().as_secs_f64());
                return Ok(receipt);
            }
            if started.elapsed() >= self.receipt_timeout {
                return Err(ChainError::transient(format!(
                    "transaction {} not mined within {}ms",
                    tx_hash,
                    self.receipt_timeout.as_millis()
                )));
            }
            sleep(self.poll_interval).await;
        }
    }
}

/// Node replies to a resent transaction whose first copy was accepted.
fn already_submitted(e: &ChainError) -> bool {
    let msg = e.message().to_lowercase();
    ["already known", "known transaction", "already imported", "nonce too low"]
        .iter()
        .any(|m| msg.contains(m))
}

#[async_trait]
impl CertificateRegistry for ContractClient {
    async fn probe(&self) -> Result<ChainStatus, ChainError> {
        let chain_id = self.chain_id().await?;
        let block_number = parse_quantity(&self.rpc.call("eth_blockNumber", json!([])).await?)?;
        Ok(ChainStatus { chain_id, block_number })
    }

    async fn verify(&self, hash: &CertificateHash) -> Result<OnChainCertificate, ChainError> {
        let out = self
            .call_view(abi::encode_bytes32_call(VERIFY_CERTIFICATE, hash.as_bytes()))
            .await?;
        abi::decode_verify_result(&out)
    }

    async fn register(&self, hash: &CertificateHash) -> Result<TxReceipt, ChainError> {
        let chain_id = self.chain_id().await?;
        let _guard = self.send_lock.lock().await;

        let from = self.signer.address().to_string();
        let nonce = parse_quantity(
            &self
                .rpc
                .call("eth_getTransactionCount", json!([from, "pending"]))
                .await?,
        )?;

        let tx = LegacyTransaction {
            nonce,
            gas_price: self.gas_price_wei,
            gas_limit: self.gas_limit,
            to: self.contract,
            value: 0,
            data: abi::encode_bytes32_call(REGISTER_CERTIFICATE, hash.as_bytes()),
        };
        let signed = self.signer.sign(&tx, chain_id).map_err(ChainError::permanent)?;

        let sent = self
            .rpc
            .call_resending("eth_sendRawTransaction", json!([signed.raw_hex()]), already_submitted)
            .await?;
        let tx_hash = sent
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| signed.hash_hex());

        let receipt = self.wait_for_receipt(&tx_hash).await?;
        if receipt.get("status").and_then(|s| s.as_str()) == Some("0x0") {
            return Err(ChainError::permanent(format!("transaction {} reverted", tx_hash)));
        }
        let block_number = receipt
            .get("blockNumber")
            .map(parse_quantity)
            .transpose()?
            .unwrap_or(0);
        let gas_used = receipt
            .get("gasUsed")
            .map(parse_quantity)
            .transpose()?
            .unwrap_or(0);

        Ok(TxReceipt { tx_hash, block_number, gas_used })
    }

    async fn certificate_count(&self) -> Result<u64, ChainError> {
        let out = self.call_view(abi::encode_call(CERTIFICATE_COUNT)).await?;
        abi::decode_uint(&out)
    }

    fn issuer(&self) -> Address {
        self.signer.address()
    }
}
