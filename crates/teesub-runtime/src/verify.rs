//! Client-side checks over an analyze response.
//!
//! Everything is recomputed from the JSON as received: the report hash from
//! the raw `report` object and the signature over the raw `payload` object.
//! Fields this crate does not model still count toward both.

use serde_json::Value;
use teesub_core::{
    report_hash, verify_signed, AnalyzeResponse, Attestation, CanonicalError, SignatureError,
    TeePayload,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("response is missing the {0:?} object")]
    MissingField(&'static str),
    #[error("{field} does not decode: {source}")]
    Decode {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("report hash mismatch: payload commits to {expected}, report hashes to {actual}")]
    HashMismatch { expected: String, actual: String },
    #[error("payload nonce {payload} does not match attestation nonce {attestation}")]
    NonceMismatch { payload: String, attestation: String },
    #[error("public key in attestation does not match the expected key")]
    UnexpectedKey,
    #[error(transparent)]
    Signature(#[from] SignatureError),
    #[error(transparent)]
    Canonical(#[from] CanonicalError),
}

/// What a successful verification established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedResponse {
    pub attestation: Attestation,
    pub payload: TeePayload,
    pub report_hash: String,
}

/// Verify a response as raw JSON.
///
/// Checks, in order: the attestation parses (which pins the provider to the
/// substitute), the report hashes to `payload.reportHash`, payload and
/// attestation carry the same nonce, and the signature verifies under the
/// attested key.
pub fn verify_response(response: &Value) -> Result<VerifiedResponse, VerifyError> {
    let attestation_value = field(response, "attestation")?;
    let payload_value = field(response, "payload")?;
    let report_value = field(response, "report")?;
    let signature = response
        .get("signature")
        .and_then(Value::as_str)
        .ok_or(VerifyError::MissingField("signature"))?;

    let attestation: Attestation = decode("attestation", attestation_value)?;
    let payload: TeePayload = decode("payload", payload_value)?;

    let actual = report_hash(report_value)?;
    if actual != payload.report_hash {
        return Err(VerifyError::HashMismatch {
            expected: payload.report_hash,
            actual,
        });
    }

    if payload.tee_nonce != attestation.tee_nonce {
        return Err(VerifyError::NonceMismatch {
            payload: payload.tee_nonce,
            attestation: attestation.tee_nonce,
        });
    }

    verify_signed(&attestation.enclave_pub_key, payload_value, signature)?;

    Ok(VerifiedResponse {
        attestation,
        report_hash: actual,
        payload,
    })
}

/// Like [`verify_response`], additionally pinning the signer's public key.
pub fn verify_response_with_key(
    response: &Value,
    expected_pub_key: &str,
) -> Result<VerifiedResponse, VerifyError> {
    let verified = verify_response(response)?;
    if !verified
        .attestation
        .enclave_pub_key
        .eq_ignore_ascii_case(expected_pub_key)
    {
        return Err(VerifyError::UnexpectedKey);
    }
    Ok(verified)
}

pub fn verify_analyze_response(response: &AnalyzeResponse) -> Result<VerifiedResponse, VerifyError> {
    let value = serde_json::to_value(response).map_err(CanonicalError::from)?;
    verify_response(&value)
}

fn field<'a>(response: &'a Value, name: &'static str) -> Result<&'a Value, VerifyError> {
    response
        .get(name)
        .filter(|v| v.is_object())
        .ok_or(VerifyError::MissingField(name))
}

fn decode<T: serde::de::DeserializeOwned>(
    field: &'static str,
    value: &Value,
) -> Result<T, VerifyError> {
    T::deserialize(value).map_err(|source| VerifyError::Decode { field, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use teesub_core::{EnclaveKeypair, Provider};

    fn signed_response(keys: &EnclaveKeypair) -> Value {
        let report = json!({ "datasetId": "ds", "verdict": "ALLOW", "score": 100, "findings": [] });
        let report_hash = report_hash(&report).unwrap();
        let payload = json!({
            "datasetMerkleRoot": "0xroot",
            "encryptedDataBlobId": "blob",
            "policyVersion": "p1",
            "reportHash": report_hash,
            "modelVersion": "m1",
            "teeNonce": "0x01",
        });
        let signature = keys.sign(&payload).unwrap();
        json!({
            "attestation": Attestation::substitute("0x01", keys.public_key_hex()),
            "payload": payload,
            "signature": signature,
            "report": report,
        })
    }

    #[test]
    fn accepts_untouched_response() {
        let keys = EnclaveKeypair::from_secret_bytes([9u8; 32]);
        let verified = verify_response(&signed_response(&keys)).unwrap();
        assert_eq!(verified.attestation.provider, Provider::LocalDevSubstitute);
        assert_eq!(verified.payload.report_hash, verified.report_hash);
    }

    #[test]
    fn report_edit_breaks_hash() {
        let keys = EnclaveKeypair::from_secret_bytes([9u8; 32]);
        let mut response = signed_response(&keys);
        response["report"]["verdict"] = json!("BLOCK");
        assert!(matches!(
            verify_response(&response),
            Err(VerifyError::HashMismatch { .. })
        ));
    }

    #[test]
    fn payload_edit_breaks_signature() {
        let keys = EnclaveKeypair::from_secret_bytes([9u8; 32]);
        let mut response = signed_response(&keys);
        response["payload"]["policyVersion"] = json!("p2");
        assert!(matches!(
            verify_response(&response),
            Err(VerifyError::Signature(SignatureError::Mismatch))
        ));
    }

    #[test]
    fn nonce_must_match_attestation() {
        let keys = EnclaveKeypair::from_secret_bytes([9u8; 32]);
        let mut response = signed_response(&keys);
        response["attestation"]["teeNonce"] = json!("0x02");
        assert!(matches!(
            verify_response(&response),
            Err(VerifyError::NonceMismatch { .. })
        ));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let keys = EnclaveKeypair::from_secret_bytes([9u8; 32]);
        let mut response = signed_response(&keys);
        response["attestation"]["provider"] = json!("SGX_DCAP");
        assert!(matches!(
            verify_response(&response),
            Err(VerifyError::Decode { field: "attestation", .. })
        ));
    }

    #[test]
    fn missing_parts_are_reported() {
        assert!(matches!(
            verify_response(&json!({})),
            Err(VerifyError::MissingField("attestation"))
        ));
    }

    #[test]
    fn pinned_key_must_match() {
        let keys = EnclaveKeypair::from_secret_bytes([9u8; 32]);
        let other = EnclaveKeypair::from_secret_bytes([7u8; 32]);
        let response = signed_response(&keys);
        assert!(verify_response_with_key(&response, keys.public_key_hex()).is_ok());
        assert!(matches!(
            verify_response_with_key(&response, other.public_key_hex()),
            Err(VerifyError::UnexpectedKey)
        ));
    }
}
