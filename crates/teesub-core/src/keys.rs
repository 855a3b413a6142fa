use core::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey, SECRET_KEY_LENGTH};
use rand_core::{OsRng, RngCore};
use serde::Serialize;
use thiserror::Error;

use crate::canonical::{canonical_json_bytes, CanonicalError};
use crate::hash::{parse_prefixed_hex, to_prefixed_hex};

/// Nonce width in bytes (256 bits of entropy).
pub const NONCE_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("OS random source unavailable: {0}")]
    Entropy(#[from] rand_core::Error),
}

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("public key must be 0x-prefixed hex of 32 bytes")]
    PublicKeyEncoding,
    #[error("public key is not a valid Ed25519 point")]
    InvalidPublicKey,
    #[error("signature must be 0x-prefixed hex of 64 bytes")]
    SignatureEncoding,
    #[error("signature does not match payload")]
    Mismatch,
    #[error(transparent)]
    Canonical(#[from] CanonicalError),
}

/// Ed25519 keypair held for the lifetime of the process.
///
/// Nothing mutates it after construction, so it is shared behind an `Arc` and
/// used for signing from any number of threads.
pub struct EnclaveKeypair {
    signing_key: SigningKey,
    public_key_hex: String,
}

impl EnclaveKeypair {
    pub fn generate() -> Result<Self, KeyError> {
        let mut secret = [0u8; SECRET_KEY_LENGTH];
        OsRng.try_fill_bytes(&mut secret)?;
        Ok(Self::from_secret_bytes(secret))
    }

    pub fn from_secret_bytes(secret: [u8; SECRET_KEY_LENGTH]) -> Self {
        let signing_key = SigningKey::from_bytes(&secret);
        let public_key_hex = to_prefixed_hex(&signing_key.verifying_key().to_bytes());
        Self {
            signing_key,
            public_key_hex,
        }
    }

    pub fn public_key_hex(&self) -> &str {
        &self.public_key_hex
    }

    /// Sign the canonical encoding of `payload`; returns `0x`-prefixed hex.
    pub fn sign<T: Serialize + ?Sized>(&self, payload: &T) -> Result<String, CanonicalError> {
        let msg = canonical_json_bytes(payload)?;
        let sig: Signature = self.signing_key.sign(&msg);
        Ok(to_prefixed_hex(&sig.to_bytes()))
    }
}

impl fmt::Debug for EnclaveKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnclaveKeypair")
            .field("public_key", &self.public_key_hex)
            .finish_non_exhaustive()
    }
}

/// Fresh random nonce as `0x`-prefixed hex.
pub fn generate_nonce() -> String {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    to_prefixed_hex(&nonce)
}

/// Check `signature_hex` over the canonical encoding of `payload`.
pub fn verify_signed<T: Serialize + ?Sized>(
    public_key_hex: &str,
    payload: &T,
    signature_hex: &str,
) -> Result<(), SignatureError> {
    let pk: [u8; 32] = decode_fixed(public_key_hex).ok_or(SignatureError::PublicKeyEncoding)?;
    let vk = VerifyingKey::from_bytes(&pk).map_err(|_| SignatureError::InvalidPublicKey)?;
    let sig: [u8; 64] = decode_fixed(signature_hex).ok_or(SignatureError::SignatureEncoding)?;
    let sig = Signature::from_bytes(&sig);
    let msg = canonical_json_bytes(payload)?;
    vk.verify(&msg, &sig).map_err(|_| SignatureError::Mismatch)
}

fn decode_fixed<const N: usize>(s: &str) -> Option<[u8; N]> {
    parse_prefixed_hex(s)?.try_into().ok()
}
