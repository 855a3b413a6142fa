//! Request orchestration: resolve, scan, judge, sign, attest.
//!
//! A [`Pipeline`] is built once per process and shared across requests. Each
//! call to [`Pipeline::analyze`] owns its findings, report and nonce; the only
//! shared state is the read-only keypair.

use core::fmt;
use std::path::Path;
use std::sync::Arc;

use teesub_core::{
    generate_nonce, report_hash, AnalyzeResponse, CanonicalError, ComplianceReport,
    DatasetRequest, EnclaveKeypair, ReportExtensions, TeePayload,
};
use thiserror::Error;
use tracing::{debug, info, info_span, warn};

use crate::attester::{Attester, SubstituteAttester};
use crate::config::PipelineConfig;
use crate::enrich::{
    weapon_flag, EnrichmentError, FileSampler, NarrativeRequest, Narrator, UnavailableDetector,
    UniformSampler, WeaponDetector,
};
use crate::inventory::DatasetInventory;
use crate::narrative::AnthropicNarrator;
use crate::resolve::{DatasetResolver, ResolveError};
use crate::scan::scan_dataset;
use crate::verdict::assess;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Resolved,
    Scanned,
    Scored,
    Enriched,
    Encoded,
    Hashed,
    Signed,
    Attested,
    Responded,
    Rejected,
}

impl Stage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Resolved => "resolved",
            Self::Scanned => "scanned",
            Self::Scored => "scored",
            Self::Enriched => "enriched",
            Self::Encoded => "encoded",
            Self::Hashed => "hashed",
            Self::Signed => "signed",
            Self::Attested => "attested",
            Self::Responded => "responded",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Rejected(#[from] ResolveError),
    #[error("report encoding failed: {0}")]
    Encoding(#[from] CanonicalError),
}

impl PipelineError {
    /// Whether the caller sent a bad reference, as opposed to a service fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

pub struct Pipeline {
    resolver: DatasetResolver,
    keys: Arc<EnclaveKeypair>,
    attester: Box<dyn Attester>,
    sampler: Box<dyn FileSampler>,
    detector: Box<dyn WeaponDetector>,
    narrator: Option<Box<dyn Narrator>>,
    sample_size: usize,
}

impl Pipeline {
    /// Pipeline with the substitute attester, a uniform sampler, no weapon
    /// backend and no narrator.
    pub fn new(resolver: DatasetResolver, keys: Arc<EnclaveKeypair>) -> Self {
        Self {
            resolver,
            keys,
            attester: Box::new(SubstituteAttester),
            sampler: Box::new(UniformSampler),
            detector: Box::new(UnavailableDetector::for_model(None)),
            narrator: None,
            sample_size: 1,
        }
    }

    /// Wire collaborators from configuration. A narrator client that cannot
    /// be built is logged and left out.
    pub fn from_config(config: &PipelineConfig, keys: Arc<EnclaveKeypair>) -> Self {
        let mut pipeline = Self::new(DatasetResolver::new(&config.dataset_base), keys)
            .with_detector(UnavailableDetector::for_model(
                config.detector_model.as_deref(),
            ))
            .with_sample_size(config.sample_size);

        match &config.narrative {
            Some(narrative) => match AnthropicNarrator::new(narrative) {
                Ok(narrator) => pipeline = pipeline.with_narrator(narrator),
                Err(err) => warn!(error = %err, "narrative collaborator disabled"),
            },
            None => info!("no narrative credential configured; narrative disabled"),
        }
        pipeline
    }

    pub fn with_attester(mut self, attester: impl Attester + 'static) -> Self {
        self.attester = Box::new(attester);
        self
    }

    pub fn with_sampler(mut self, sampler: impl FileSampler + 'static) -> Self {
        self.sampler = Box::new(sampler);
        self
    }

    pub fn with_detector(mut self, detector: impl WeaponDetector + 'static) -> Self {
        self.detector = Box::new(detector);
        self
    }

    pub fn with_narrator(mut self, narrator: impl Narrator + 'static) -> Self {
        self.narrator = Some(Box::new(narrator));
        self
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    pub fn keys(&self) -> &Arc<EnclaveKeypair> {
        &self.keys
    }

    pub fn dataset_base(&self) -> &Path {
        self.resolver.base()
    }

    /// Run one request end to end.
    ///
    /// Extensions are settled before the report is hashed; the report that is
    /// returned is the one that was hashed and is not touched afterwards.
    pub fn analyze(&self, request: &DatasetRequest) -> Result<AnalyzeResponse, PipelineError> {
        let span = info_span!("analyze", dataset_id = %request.dataset_id);
        let _guard = span.enter();
        stage(Stage::Received);

        let root = self.resolver.resolve(&request.encrypted_data_blob_id).map_err(|err| {
            stage(Stage::Rejected);
            err
        })?;
        stage(Stage::Resolved);

        let inventory = DatasetInventory::collect(&root);
        let findings = scan_dataset(&inventory);
        stage(Stage::Scanned);

        let assessment = assess(&findings);
        stage(Stage::Scored);

        let extensions = self.enrich(request, &inventory);
        let report = ComplianceReport::new(
            request,
            assessment.verdict,
            assessment.score,
            findings,
            extensions,
        );
        let report_hash = report_hash(&report).map_err(encoding_failure)?;
        stage(Stage::Encoded);
        stage(Stage::Hashed);

        let tee_nonce = generate_nonce();
        let payload = TeePayload::new(request, report_hash, tee_nonce);
        let signature = self.keys.sign(&payload).map_err(encoding_failure)?;
        stage(Stage::Signed);

        let attestation = self.attester.attest(&payload.tee_nonce, &self.keys);
        stage(Stage::Attested);

        info!(
            verdict = %report.verdict,
            score = report.score,
            findings = report.findings.len(),
            "dataset analyzed"
        );
        stage(Stage::Responded);

        Ok(AnalyzeResponse {
            attestation,
            payload,
            signature,
            report,
        })
    }

    fn enrich(&self, request: &DatasetRequest, inventory: &DatasetInventory) -> ReportExtensions {
        let mut enriched = false;
        let flag = match weapon_flag(
            inventory.files(),
            self.sampler.as_ref(),
            self.detector.as_ref(),
            self.sample_size,
        ) {
            Ok(flag) => {
                enriched = true;
                flag
            }
            Err(err) => {
                log_enrichment_failure("weapon detector", &err);
                false
            }
        };

        let narrative = self.narrator.as_ref().and_then(|narrator| {
            let narrative_request = NarrativeRequest {
                dataset_id: request.dataset_id.clone(),
                stats: inventory.stats(),
                weapon_flag: flag,
            };
            narrator
                .narrate(&narrative_request)
                .map_err(|err| log_enrichment_failure("narrator", &err))
                .ok()
        });
        if enriched || narrative.is_some() {
            stage(Stage::Enriched);
        }

        ReportExtensions {
            weapon_flag: Some(flag),
            narrative,
        }
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("resolver", &self.resolver)
            .field("keys", &self.keys)
            .field("narrator", &self.narrator.is_some())
            .field("sample_size", &self.sample_size)
            .finish_non_exhaustive()
    }
}

fn stage(stage: Stage) {
    debug!(stage = stage.as_str(), "stage complete");
}

/// Records that cannot be encoded are a bug in this crate, not bad input.
fn encoding_failure(err: CanonicalError) -> PipelineError {
    if cfg!(debug_assertions) {
        panic!("canonical encoding contract violated: {err}");
    }
    PipelineError::Encoding(err)
}

fn log_enrichment_failure(collaborator: &'static str, err: &EnrichmentError) {
    match err {
        EnrichmentError::Unavailable(_) => info!(collaborator, error = %err, "enrichment skipped"),
        EnrichmentError::Malformed(_) => warn!(collaborator, error = %err, "enrichment discarded"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_rejections_are_client_errors() {
        let rejected = PipelineError::from(ResolveError::DatasetNotFound {
            reference: "x".to_string(),
        });
        assert!(rejected.is_client_error());

        let encoding = PipelineError::from(CanonicalError::NotAnObject { kind: "array" });
        assert!(!encoding.is_client_error());
    }

    #[test]
    fn stages_render_lowercase() {
        assert_eq!(Stage::Received.to_string(), "received");
        assert_eq!(Stage::Responded.as_str(), "responded");
    }
}
