pub mod attester;
pub mod config;
pub mod enrich;
pub mod inventory;
pub mod narrative;
pub mod pipeline;
pub mod resolve;
pub mod scan;
pub mod verdict;
pub mod verify;

pub use attester::{Attester, SubstituteAttester};
pub use config::{ConfigError, NarrativeConfig, PipelineConfig};
pub use enrich::{
    EnrichmentError, FileSampler, FixedProbabilityDetector, FixedSampler, NarrativeRequest,
    Narrator, StaticNarrator, UnavailableDetector, UniformSampler, WeaponDetector,
};
pub use inventory::{DatasetFile, DatasetInventory, DatasetStats};
pub use narrative::AnthropicNarrator;
pub use pipeline::{Pipeline, PipelineError, Stage};
pub use resolve::{DatasetResolver, ResolveError};
pub use scan::{scan_dataset, scan_text};
pub use verdict::{assess, Assessment};
pub use verify::{
    verify_analyze_response, verify_response, verify_response_with_key, VerifiedResponse,
    VerifyError,
};
