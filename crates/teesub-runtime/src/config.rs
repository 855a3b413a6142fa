use core::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DATASET_BASE_ENV: &str = "DEV_DATASET_BASE_PATH";
pub const DETECTOR_MODEL_ENV: &str = "GUN_DETECTOR_ONNX_PATH";
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const NARRATIVE_MODEL_ENV: &str = "TEESUB_NARRATIVE_MODEL";
pub const NARRATIVE_TIMEOUT_ENV: &str = "TEESUB_NARRATIVE_TIMEOUT_SECS";
pub const SAMPLE_SIZE_ENV: &str = "TEESUB_SAMPLE_SIZE";

/// Dataset folder under the working directory when no override is set.
pub const DEFAULT_DATASET_DIR: &str = "dev_datasets";
pub const DEFAULT_NARRATIVE_MODEL: &str = "claude-3-5-sonnet-latest";
pub const DEFAULT_NARRATIVE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_SAMPLE_SIZE: usize = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("cannot determine working directory: {0}")]
    CurrentDir(#[from] std::io::Error),
}

#[derive(Clone)]
pub struct NarrativeConfig {
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl fmt::Debug for NarrativeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NarrativeConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub dataset_base: PathBuf,
    /// Weapon model location. No inference backend is compiled in, so this
    /// only names the model in the detector's "unavailable" reason.
    pub detector_model: Option<PathBuf>,
    /// `None` disables the narrative collaborator and nothing else.
    pub narrative: Option<NarrativeConfig>,
    pub sample_size: usize,
}

impl PipelineConfig {
    pub fn new(dataset_base: impl Into<PathBuf>) -> Self {
        Self {
            dataset_base: dataset_base.into(),
            detector_model: None,
            narrative: None,
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let dataset_base = match get(DATASET_BASE_ENV) {
            Some(path) => PathBuf::from(path),
            None => std::env::current_dir()?.join(DEFAULT_DATASET_DIR),
        };

        let narrative = match get(API_KEY_ENV) {
            Some(api_key) => Some(NarrativeConfig {
                api_key,
                model: get(NARRATIVE_MODEL_ENV)
                    .unwrap_or_else(|| DEFAULT_NARRATIVE_MODEL.to_string()),
                timeout: match get(NARRATIVE_TIMEOUT_ENV) {
                    Some(v) => Duration::from_secs(parse_positive(NARRATIVE_TIMEOUT_ENV, &v)?),
                    None => DEFAULT_NARRATIVE_TIMEOUT,
                },
            }),
            None => None,
        };

        let sample_size = match get(SAMPLE_SIZE_ENV) {
            Some(v) => parse_positive(SAMPLE_SIZE_ENV, &v)? as usize,
            None => DEFAULT_SAMPLE_SIZE,
        };

        Ok(Self {
            dataset_base,
            detector_model: get(DETECTOR_MODEL_ENV).map(PathBuf::from),
            narrative,
            sample_size,
        })
    }
}

fn parse_positive(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidNumber {
            var,
            value: value.to_string(),
        }),
    }
}
