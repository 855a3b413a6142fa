use serde::{Deserialize, Serialize};

/// Measurement reported by this substitute. Stable for a given crate version
/// and never equal to a hardware enclave measurement.
pub const SUBSTITUTE_MEASUREMENT: &str =
    concat!("substitute-local-dev-teesub-v", env!("CARGO_PKG_VERSION"));

/// Attestation provider. There is exactly one value, so an attestation from
/// this crate can neither be built nor parsed as anything but a substitute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "LOCAL_DEV_SUBSTITUTE")]
    LocalDevSubstitute,
}

impl Provider {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LocalDevSubstitute => "LOCAL_DEV_SUBSTITUTE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attestation {
    pub tee_measurement: String,
    pub tee_nonce: String,
    pub enclave_pub_key: String,
    pub provider: Provider,
}

impl Attestation {
    pub fn substitute(tee_nonce: &str, enclave_pub_key: &str) -> Self {
        Self {
            tee_measurement: SUBSTITUTE_MEASUREMENT.to_string(),
            tee_nonce: tee_nonce.to_string(),
            enclave_pub_key: enclave_pub_key.to_string(),
            provider: Provider::LocalDevSubstitute,
        }
    }
}
