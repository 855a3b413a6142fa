//! Optional collaborators that add extension fields to a report.
//!
//! Every collaborator returns a `Result`; the pipeline decides what a failure
//! means for the report. None of them can abort a request.

use std::path::Path;

use rand::seq::SliceRandom;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::inventory::{DatasetFile, DatasetStats};

/// Probability above which a sampled image sets the weapon flag.
pub const WEAPON_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnrichmentError {
    /// Credential missing, transport failure, backend not installed.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    /// The collaborator answered but broke its output contract.
    #[error("collaborator returned a malformed response: {0}")]
    Malformed(String),
}

pub trait WeaponDetector: Send + Sync {
    /// Probability in `[0, 1]` that `image` shows a weapon.
    fn weapon_probability(&self, image: &Path) -> Result<f64, EnrichmentError>;
}

/// Detector used when no inference backend is wired in.
#[derive(Debug, Clone)]
pub struct UnavailableDetector {
    reason: String,
}

impl UnavailableDetector {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn for_model(model: Option<&Path>) -> Self {
        match model {
            Some(path) => Self::new(format!(
                "no inference backend available for model {}",
                path.display()
            )),
            None => Self::new("no weapon detection model configured"),
        }
    }
}

impl WeaponDetector for UnavailableDetector {
    fn weapon_probability(&self, _image: &Path) -> Result<f64, EnrichmentError> {
        Err(EnrichmentError::Unavailable(self.reason.clone()))
    }
}

pub trait FileSampler: Send + Sync {
    fn sample<'a>(&self, files: &'a [DatasetFile], count: usize) -> Vec<&'a DatasetFile>;
}

/// Uniform sample without replacement from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformSampler;

impl FileSampler for UniformSampler {
    fn sample<'a>(&self, files: &'a [DatasetFile], count: usize) -> Vec<&'a DatasetFile> {
        files
            .choose_multiple(&mut rand::thread_rng(), count)
            .collect()
    }
}

/// Picks the files with the given relative paths, in the given order.
#[derive(Debug, Clone, Default)]
pub struct FixedSampler {
    picks: Vec<String>,
}

impl FixedSampler {
    pub fn new<I, S>(picks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            picks: picks.into_iter().map(Into::into).collect(),
        }
    }
}

impl FileSampler for FixedSampler {
    fn sample<'a>(&self, files: &'a [DatasetFile], count: usize) -> Vec<&'a DatasetFile> {
        self.picks
            .iter()
            .filter_map(|pick| files.iter().find(|f| &f.rel_path == pick))
            .take(count)
            .collect()
    }
}

/// True iff any sampled image scores above [`WEAPON_THRESHOLD`].
///
/// Samples without an image never reach the detector and yield `false`.
pub fn weapon_flag(
    files: &[DatasetFile],
    sampler: &dyn FileSampler,
    detector: &dyn WeaponDetector,
    sample_size: usize,
) -> Result<bool, EnrichmentError> {
    for file in sampler.sample(files, sample_size) {
        if !file.is_image() {
            continue;
        }
        let probability = detector.weapon_probability(&file.abs_path)?;
        if !(0.0..=1.0).contains(&probability) {
            return Err(EnrichmentError::Malformed(format!(
                "probability {probability} outside [0, 1]"
            )));
        }
        if probability > WEAPON_THRESHOLD {
            return Ok(true);
        }
    }
    Ok(false)
}

/// What the narrative collaborator gets to see about a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrativeRequest {
    pub dataset_id: String,
    #[serde(flatten)]
    pub stats: DatasetStats,
    pub weapon_flag: bool,
}

pub trait Narrator: Send + Sync {
    /// A JSON object describing the dataset, or an error.
    fn narrate(&self, request: &NarrativeRequest) -> Result<Value, EnrichmentError>;
}

/// Narrator that serves a fixed document. Handy for offline runs and tests.
#[derive(Debug, Clone)]
pub struct StaticNarrator {
    document: Value,
}

impl StaticNarrator {
    pub fn new(document: Value) -> Self {
        Self { document }
    }
}

impl Narrator for StaticNarrator {
    fn narrate(&self, _request: &NarrativeRequest) -> Result<Value, EnrichmentError> {
        if !self.document.is_object() {
            return Err(EnrichmentError::Malformed(
                "narrative must be a JSON object".to_string(),
            ));
        }
        Ok(self.document.clone())
    }
}

/// A detector that always answers with the same probability.
#[derive(Debug, Clone, Copy)]
pub struct FixedProbabilityDetector(pub f64);

impl WeaponDetector for FixedProbabilityDetector {
    fn weapon_probability(&self, _image: &Path) -> Result<f64, EnrichmentError> {
        Ok(self.0)
    }
}
