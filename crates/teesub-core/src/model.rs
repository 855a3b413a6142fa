use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attestation::Attestation;

/// Body of an analyze request.
///
/// `encrypted_data_blob_id` names a folder under the dataset base directory in
/// the substitute; a real enclave would decrypt a remote blob instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetRequest {
    pub dataset_id: String,
    pub dataset_merkle_root: String,
    pub encrypted_data_blob_id: String,
    pub policy_version: String,
    pub model_version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FindingKind {
    Email,
    Phone,
    Iban,
}

impl FindingKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Email => "EMAIL",
            Self::Phone => "PHONE",
            Self::Iban => "IBAN",
        }
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pattern match at a dataset-relative path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(rename = "type")]
    pub kind: FindingKind,
    pub path: String,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Allow,
    Warn,
    Block,
}

impl Verdict {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "ALLOW",
            Self::Warn => "WARN",
            Self::Block => "BLOCK",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional collaborator outputs carried by the report.
///
/// Flattened into the report object; an absent field is omitted from the
/// encoding rather than written as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportExtensions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weapon_flag: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    pub dataset_id: String,
    pub dataset_merkle_root: String,
    pub encrypted_data_blob_id: String,
    pub policy_version: String,
    pub model_version: String,
    pub verdict: Verdict,
    pub score: u8,
    pub findings: Vec<Finding>,
    #[serde(flatten)]
    pub extensions: ReportExtensions,
}

impl ComplianceReport {
    pub fn new(
        request: &DatasetRequest,
        verdict: Verdict,
        score: u8,
        findings: Vec<Finding>,
        extensions: ReportExtensions,
    ) -> Self {
        Self {
            dataset_id: request.dataset_id.clone(),
            dataset_merkle_root: request.dataset_merkle_root.clone(),
            encrypted_data_blob_id: request.encrypted_data_blob_id.clone(),
            policy_version: request.policy_version.clone(),
            model_version: request.model_version.clone(),
            verdict,
            score,
            findings,
            extensions,
        }
    }
}

/// The signed commitment. Bound to the full report only through `report_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeePayload {
    pub dataset_merkle_root: String,
    pub encrypted_data_blob_id: String,
    pub policy_version: String,
    pub report_hash: String,
    pub model_version: String,
    pub tee_nonce: String,
}

impl TeePayload {
    pub fn new(request: &DatasetRequest, report_hash: String, tee_nonce: String) -> Self {
        Self {
            dataset_merkle_root: request.dataset_merkle_root.clone(),
            encrypted_data_blob_id: request.encrypted_data_blob_id.clone(),
            policy_version: request.policy_version.clone(),
            report_hash,
            model_version: request.model_version.clone(),
            tee_nonce,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub attestation: Attestation,
    pub payload: TeePayload,
    pub signature: String,
    pub report: ComplianceReport,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> DatasetRequest {
        DatasetRequest {
            dataset_id: "ds-1".into(),
            dataset_merkle_root: "0xabc".into(),
            encrypted_data_blob_id: "blob".into(),
            policy_version: "p1".into(),
            model_version: "m1".into(),
        }
    }

    #[test]
    fn report_uses_wire_field_names() {
        let report = ComplianceReport::new(
            &request(),
            Verdict::Warn,
            70,
            vec![Finding {
                kind: FindingKind::Email,
                path: "a.txt".into(),
                detail: "a@b.com".into(),
            }],
            ReportExtensions::default(),
        );
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(
            value,
            json!({
                "datasetId": "ds-1",
                "datasetMerkleRoot": "0xabc",
                "encryptedDataBlobId": "blob",
                "policyVersion": "p1",
                "modelVersion": "m1",
                "verdict": "WARN",
                "score": 70,
                "findings": [{ "type": "EMAIL", "path": "a.txt", "detail": "a@b.com" }],
            })
        );
    }

    #[test]
    fn extensions_flatten_into_report() {
        let report = ComplianceReport::new(
            &request(),
            Verdict::Allow,
            100,
            Vec::new(),
            ReportExtensions {
                weapon_flag: Some(false),
                narrative: Some(json!({ "summary": "ok" })),
            },
        );
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["weaponFlag"], json!(false));
        assert_eq!(value["narrative"]["summary"], json!("ok"));

        let back: ComplianceReport = serde_json::from_value(value).unwrap();
        assert_eq!(back, report);
    }
}
