use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::canonical::{canonical_json_bytes, CanonicalError};

pub const HEX_PREFIX: &str = "0x";

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let out = hasher.finalize();
    let mut out32 = [0u8; 32];
    out32.copy_from_slice(&out);
    out32
}

pub fn to_prefixed_hex(bytes: &[u8]) -> String {
    format!("{HEX_PREFIX}{}", hex::encode(bytes))
}

/// Decode a `0x`-prefixed hex string. The prefix is required.
pub fn parse_prefixed_hex(s: &str) -> Option<Vec<u8>> {
    let digits = s.strip_prefix(HEX_PREFIX)?;
    hex::decode(digits).ok()
}

/// Content-addressing hash of a record: SHA-256 over its canonical encoding.
pub fn report_hash<T: Serialize + ?Sized>(record: &T) -> Result<String, CanonicalError> {
    let canonical = canonical_json_bytes(record)?;
    Ok(to_prefixed_hex(&sha256(&canonical)))
}
