use teesub_core::{Attestation, EnclaveKeypair};

/// Trait to provide platform-specific attestation for a signed response.
pub trait Attester: Send + Sync {
    fn attest(&self, tee_nonce: &str, keys: &EnclaveKeypair) -> Attestation;
}

/// Software attester for local development. Always reports the substitute
/// provider and measurement.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstituteAttester;

impl Attester for SubstituteAttester {
    fn attest(&self, tee_nonce: &str, keys: &EnclaveKeypair) -> Attestation {
        Attestation::substitute(tee_nonce, keys.public_key_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teesub_core::{Provider, SUBSTITUTE_MEASUREMENT};

    #[test]
    fn substitute_attester_binds_key_and_nonce() {
        let keys = EnclaveKeypair::from_secret_bytes([9u8; 32]);
        let att = SubstituteAttester.attest("0xaa", &keys);
        assert_eq!(att.provider, Provider::LocalDevSubstitute);
        assert_eq!(att.tee_measurement, SUBSTITUTE_MEASUREMENT);
        assert_eq!(att.tee_nonce, "0xaa");
        assert_eq!(att.enclave_pub_key, keys.public_key_hex());
    }
}
