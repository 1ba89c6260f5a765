use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 fingerprint of an uploaded certificate file, used as the
/// on-chain `bytes32` lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CertificateHash([u8; 32]);

impl CertificateHash {
    pub fn of(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Accepts 64 hex characters with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, String> {
        let raw = s.trim();
        let raw = raw.strip_prefix("0x").unwrap_or(raw);
        let bytes = hex::decode(raw).map_err(|e| format!("invalid certificate hash: {}", e))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| "certificate hash must be 32 bytes".to_string())?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn to_prefixed_hex(&self) -> String {
        format!("0x{}", self.to_hex())
    }
}

impl fmt::Display for CertificateHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
