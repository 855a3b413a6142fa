pub mod attestation;
pub mod canonical;
pub mod hash;
pub mod keys;
pub mod model;

pub use attestation::{Attestation, Provider, SUBSTITUTE_MEASUREMENT};
pub use canonical::{canonical_json_bytes, canonical_value_bytes, CanonicalError};
pub use hash::{report_hash, sha256};
pub use keys::{generate_nonce, verify_signed, EnclaveKeypair, KeyError, SignatureError};
pub use model::{
    AnalyzeResponse, ComplianceReport, DatasetRequest, Finding, FindingKind, ReportExtensions,
    TeePayload, Verdict,
};
