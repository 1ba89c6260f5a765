use super::{keccak256, Address, OnChainCertificate};
use crate::error::ChainError;
use serde_json::Value;

pub const VERIFY_CERTIFICATE: &str = "verifyCertificate(bytes32)";
pub const REGISTER_CERTIFICATE: &str = "registerCertificate(bytes32)";
pub const CERTIFICATE_COUNT: &str = "certificateCount()";

const WORD: usize = 32;

pub fn selector(signature: &str) -> [u8; 4] {
    let h = keccak256(signature.as_bytes());
    [h[0], h[1], h[2], h[3]]
}

pub fn encode_call(signature: &str) -> Vec<u8> {
    selector(signature).to_vec()
}

pub fn encode_bytes32_call(signature: &str, arg: &[u8; 32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + WORD);
    out.extend_from_slice(&selector(signature));
    out.extend_from_slice(arg);
    out
}

/// Decodes `(bool, uint256, address, uint256)`.
pub fn decode_verify_result(data: &[u8]) -> Result<OnChainCertificate, ChainError> {
    if data.len() < 4 * WORD {
        return Err(ChainError::permanent(format!(
            "verifyCertificate returned {} bytes, expected {}",
            data.len(),
            4 * WORD
        )));
    }
    let word = |i: usize| &data[i * WORD..(i + 1) * WORD];

    let exists = match word_to_u64(word(0))? {
        0 => false,
        1 => true,
        other => return Err(ChainError::permanent(format!("invalid bool word: {}", other))),
    };
    let id = word_to_u64(word(1))?;
    let issuer_word = word(2);
    if issuer_word[..12].iter().any(|&b| b != 0) {
        return Err(ChainError::permanent("invalid address word"));
    }
    let issuer = Address::from_slice(&issuer_word[12..]).map_err(ChainError::permanent)?;
    let timestamp = word_to_u64(word(3))?;

    Ok(OnChainCertificate { exists, id, issuer, timestamp })
}

pub fn decode_uint(data: &[u8]) -> Result<u64, ChainError> {
    if data.len() < WORD {
        return Err(ChainError::permanent(format!("expected a 32-byte word, got {} bytes", data.len())));
    }
    word_to_u64(&data[..WORD])
}

fn word_to_u64(word: &[u8]) -> Result<u64, ChainError> {
    if word[..WORD - 8].iter().any(|&b| b != 0) {
        return Err(ChainError::permanent("uint256 value does not fit in 64 bits"));
    }
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&word[WORD - 8..]);
    Ok(u64::from_be_bytes(tail))
}

/// Confirms a contract ABI JSON document declares the functions this
/// service calls, with matching input types.
pub fn check_abi(json: &str) -> Result<(), String> {
    let entries: Vec<Value> = serde_json::from_str(json).map_err(|e| format!("invalid ABI JSON: {}", e))?;
    for signature in [VERIFY_CERTIFICATE, REGISTER_CERTIFICATE, CERTIFICATE_COUNT] {
        let (name, args) = signature
            .split_once('(')
            .ok_or_else(|| format!("malformed signature {}", signature))?;
        let expected: Vec<&str> = args
            .trim_end_matches(')')
            .split(',')
            .filter(|s| !s.is_empty())
            .collect();

        let found = entries.iter().any(|e| {
            e.get("type").and_then(|t| t.as_str()) == Some("function")
                && e.get("name").and_then(|n| n.as_str()) == Some(name)
                && input_types(e) == expected
        });
        if !found {
            return Err(format!("ABI is missing function {}", signature));
        }
    }
    Ok(())
}

fn input_types(entry: &Value) -> Vec<&str> {
    entry
        .get("inputs")
        .and_then(|i| i.as_array())
        .map(|inputs| inputs.iter().filter_map(|i| i.get("type").and_then(|t| t.as_str())).collect())
        .unwrap_or_default()
}
