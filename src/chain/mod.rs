pub mod abi;
pub mod contract;
pub mod rlp;
pub mod rpc;
pub mod signer;

use crate::error::ChainError;
use crate::hashing::CertificateHash;
use async_trait::async_trait;
use sha3::{Digest, Keccak256};
use std::fmt;

pub use contract::ContractClient;

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// 20-byte account or contract address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address([u8; 20]);

impl Address {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, String> {
        let arr: [u8; 20] = bytes
            .try_into()
            .map_err(|_| format!("address must be 20 bytes, got {}", bytes.len()))?;
        Ok(Self(arr))
    }

    pub fn parse(s: &str) -> Result<Self, String> {
        let raw = s
            .trim()
            .strip_prefix("0x")
            .ok_or_else(|| format!("address {} must start with 0x", s))?;
        let bytes = hex::decode(raw).map_err(|e| format!("invalid address {}: {}", s, e))?;
        Self::from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Decoded return value of `verifyCertificate(bytes32)`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OnChainCertificate {
    pub exists: bool,
    pub id: u64,
    pub issuer: Address,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub block_number: u64,
    pub gas_used: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainStatus {
    pub chain_id: u64,
    pub block_number: u64,
}

/// The certificate registry contract as seen by the web flows.
#[async_trait]
pub trait CertificateRegistry: Send + Sync {
    /// Reachability check used for readiness.
    async fn probe(&self) -> Result<ChainStatus, ChainError>;

    async fn verify(&self, hash: &CertificateHash) -> Result<OnChainCertificate, ChainError>;

    /// Sends `registerCertificate` and waits until it is mined.
    async fn register(&self, hash: &CertificateHash) -> Result<TxReceipt, ChainError>;

    async fn certificate_count(&self) -> Result<u64, ChainError>;

    /// Account that signs registrations.
    fn issuer(&self) -> Address;
}
