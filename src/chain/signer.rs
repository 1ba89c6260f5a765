use super::{keccak256, rlp, Address};
use k256::ecdsa::{SigningKey, VerifyingKey};

/// Pre-EIP-1559 transaction, signed with EIP-155 replay protection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: Address,
    pub value: u128,
    pub data: Vec<u8>,
}

impl LegacyTransaction {
    fn base_fields(&self) -> Vec<Vec<u8>> {
        vec![
            rlp::uint(self.nonce as u128),
            rlp::uint(self.gas_price),
            rlp::uint(self.gas_limit as u128),
            rlp::bytes(self.to.as_bytes()),
            rlp::uint(self.value),
            rlp::bytes(&self.data),
        ]
    }

    pub fn signing_payload(&self, chain_id: u64) -> Vec<u8> {
        let mut fields = self.base_fields();
        fields.push(rlp::uint(chain_id as u128));
        fields.push(rlp::uint(0));
        fields.push(rlp::uint(0));
        rlp::list(&fields)
    }

    pub fn signing_hash(&self, chain_id: u64) -> [u8; 32] {
        keccak256(&self.signing_payload(chain_id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub raw: Vec<u8>,
    pub hash: [u8; 32],
}

impl SignedTransaction {
    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }

    pub fn hash_hex(&self) -> String {
        format!("0x{}", hex::encode(self.hash))
    }
}

pub struct Signer {
    key: SigningKey,
    address: Address,
}

impl Signer {
    pub fn from_hex(private_key: &str) -> Result<Self, String> {
        let raw = private_key.trim();
        let raw = raw.strip_prefix("0x").unwrap_or(raw);
        let bytes = hex::decode(raw).map_err(|_| "private key is not valid hex".to_string())?;
        let key = SigningKey::from_slice(&bytes).map_err(|_| "private key is not a valid secp256k1 scalar".to_string())?;
        let address = address_of(key.verifying_key())?;
        Ok(Self { key, address })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn sign(&self, tx: &LegacyTransaction, chain_id: u64) -> Result<SignedTransaction, String> {
        let digest = tx.signing_hash(chain_id);
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| format!("signing failed: {}", e))?;

        let sig_bytes = signature.to_bytes();
        let (r, s) = sig_bytes.split_at(32);
        let v = recovery_id.to_byte() as u128 + 35 + 2 * chain_id as u128;

        let mut fields = tx.base_fields();
        fields.push(rlp::uint(v));
        fields.push(rlp::bytes(rlp::trim_leading_zeros(r)));
        fields.push(rlp::bytes(rlp::trim_leading_zeros(s)));
        let raw = rlp::list(&fields);
        let hash = keccak256(&raw);
        Ok(SignedTransaction { raw, hash })
    }
}

fn address_of(key: &VerifyingKey) -> Result<Address, String> {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}
