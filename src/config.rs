use crate::chain::Address;
use std::env;
use std::fmt;

#[derive(Clone)]
pub struct Config {
    pub rpc_url: String,
    pub private_key: String,
    pub account_address: String,
    pub contract_address: String,
    pub contract_abi_path: Option<String>,
    pub chain_id: Option<u64>,
    pub register_password: String,
    pub http_bind: String,
    pub upload_dir: String,
    pub issuers_path: String,
    pub gas_limit: u64,
    pub gas_price_gwei: u64,
    pub receipt_timeout_ms: u64,
    pub receipt_poll_interval_ms: u64,
    pub rpc_max_retries: u32,
    pub max_upload_bytes: usize,
    pub instance_id: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("rpc_url", &self.rpc_url)
            .field("private_key", &"<redacted>")
            .field("account_address", &self.account_address)
            .field("contract_address", &self.contract_address)
            .field("contract_abi_path", &self.contract_abi_path)
            .field("chain_id", &self.chain_id)
            .field("register_password", &"<redacted>")
            .field("http_bind", &self.http_bind)
            .field("upload_dir", &self.upload_dir)
            .field("issuers_path", &self.issuers_path)
            .field("gas_limit", &self.gas_limit)
            .field("gas_price_gwei", &self.gas_price_gwei)
            .field("receipt_timeout_ms", &self.receipt_timeout_ms)
            .field("receipt_poll_interval_ms", &self.receipt_poll_interval_ms)
            .field("rpc_max_retries", &self.rpc_max_retries)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("instance_id", &self.instance_id)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let rpc_url = env::var("RPC_URL")
            .or_else(|_| env::var("INFURA_URL"))
            .map_err(|_| "RPC_URL (or INFURA_URL) must be set".to_string())?;
        if !(rpc_url.starts_with("http://") || rpc_url.starts_with("https://")) {
            return Err("RPC_URL must be an http(s) URL".to_string());
        }

        let private_key = env::var("PRIVATE_KEY")
            .map_err(|_| "PRIVATE_KEY must be set".to_string())?;
        let key_hex = private_key.trim().trim_start_matches("0x");
        if key_hex.len() != 64 || !key_hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err("PRIVATE_KEY must be 32 bytes of hex".to_string());
        }

        let account_address = env::var("ACCOUNT_ADDRESS")
            .map_err(|_| "ACCOUNT_ADDRESS must be set".to_string())?;
        if !is_valid_address(&account_address) {
            return Err("ACCOUNT_ADDRESS invalid format".to_string());
        }

        let contract_address = env::var("CONTRACT_ADDRESS")
            .map_err(|_| "CONTRACT_ADDRESS must be set".to_string())?;
        if !is_valid_address(&contract_address) {
            return Err("CONTRACT_ADDRESS invalid format".to_string());
        }

        let contract_abi_path = env::var("CONTRACT_ABI_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty());

        let chain_id = match env::var("CHAIN_ID") {
            Ok(v) => {
                let id = v.parse::<u64>().map_err(|_| "CHAIN_ID must be a number".to_string())?;
                if id == 0 {
                    return Err("CHAIN_ID must be at least 1".to_string());
                }
                Some(id)
            }
            Err(_) => None,
        };

        let register_password = env::var("REGISTER_PASSWORD")
            .unwrap_or_else(|_| "admin123".to_string());
        if register_password.is_empty() {
            return Err("REGISTER_PASSWORD cannot be empty".to_string());
        }

        let http_bind = env::var("HTTP_BIND")
            .unwrap_or_else(|_| "127.0.0.1:5000".to_string());

        let upload_dir = env::var("UPLOAD_DIR")
            .unwrap_or_else(|_| "static/uploads".to_string());
        if upload_dir.trim().is_empty() {
            return Err("UPLOAD_DIR cannot be empty".to_string());
        }

        let issuers_path = env::var("ISSUERS_PATH")
            .unwrap_or_else(|_| "issuers.json".to_string());
        if issuers_path.trim().is_empty() {
            return Err("ISSUERS_PATH cannot be empty".to_string());
        }

        let gas_limit = env::var("GAS_LIMIT")
            .unwrap_or_else(|_| "300000".to_string())
            .parse::<u64>()
            .map_err(|_| "GAS_LIMIT must be a number".to_string())?;
        if !(21_000..=30_000_000).contains(&gas_limit) {
            return Err("GAS_LIMIT must be between 21000 and 30000000".to_string());
        }

        let gas_price_gwei = env::var("GAS_PRICE_GWEI")
            .unwrap_or_else(|_| "15".to_string())
            .parse::<u64>()
            .map_err(|_| "GAS_PRICE_GWEI must be a number".to_string())?;
        if !(1..=10_000).contains(&gas_price_gwei) {
            return Err("GAS_PRICE_GWEI must be between 1 and 10000".to_string());
        }

        let receipt_timeout_ms = env::var("RECEIPT_TIMEOUT_MS")
            .unwrap_or_else(|_| "120000".to_string())
            .parse::<u64>()
            .map_err(|_| "RECEIPT_TIMEOUT_MS must be a number".to_string())?;
        if !(1_000..=3_600_000).contains(&receipt_timeout_ms) {
            return Err("RECEIPT_TIMEOUT_MS must be between 1000 and 3600000".to_string());
        }

        let receipt_poll_interval_ms = env::var("RECEIPT_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "1000".to_string())
            .parse::<u64>()
            .map_err(|_| "RECEIPT_POLL_INTERVAL_MS must be a number".to_string())?;
        if !(50..=60_000).contains(&receipt_poll_interval_ms) {
            return Err("RECEIPT_POLL_INTERVAL_MS must be between 50 and 60000".to_string());
        }

        let rpc_max_retries = env::var("RPC_MAX_RETRIES")
            .unwrap_or_else(|_| "3".to_string())
            .parse::<u32>()
            .map_err(|_| "RPC_MAX_RETRIES must be a number".to_string())?;
        if rpc_max_retries > 10 {
            return Err("RPC_MAX_RETRIES must be between 0 and 10".to_string());
        }

        let max_upload_bytes = env::var("MAX_UPLOAD_BYTES")
            .unwrap_or_else(|_| (10_usize * 1024 * 1024).to_string())
            .parse::<usize>()
            .map_err(|_| "MAX_UPLOAD_BYTES must be a number".to_string())?;
        if !(1024..=1024 * 1024 * 1024).contains(&max_upload_bytes) {
            return Err("MAX_UPLOAD_BYTES must be between 1KB and 1GB".to_string());
        }

        let instance_id = env::var("INSTANCE_ID")
            .unwrap_or_else(|_| format!("certifier-{}", uuid::Uuid::new_v4()));
        if instance_id.trim().is_empty() {
            return Err("INSTANCE_ID cannot be empty".to_string());
        }

        Ok(Config {
            rpc_url,
            private_key,
            account_address,
            contract_address,
            contract_abi_path,
            chain_id,
            register_password,
            http_bind,
            upload_dir,
            issuers_path,
            gas_limit,
            gas_price_gwei,
            receipt_timeout_ms,
            receipt_poll_interval_ms,
            rpc_max_retries,
            max_upload_bytes,
            instance_id,
        })
    }

    pub fn gas_price_wei(&self) -> u128 {
        self.gas_price_gwei as u128 * 1_000_000_000
    }
}

fn is_valid_address(s: &str) -> bool {
    Address::parse(s).is_ok()
}
