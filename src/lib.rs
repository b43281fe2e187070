pub mod audio_processor;
pub mod batch;
pub mod classifier;
pub mod config;
pub mod denoiser;
pub mod diagnostics;
pub mod error;
pub mod feature_extractor;
pub mod masks;
pub mod spectral;

pub use audio_processor::{AudioProcessor, Waveform};
pub use batch::{run_batch, BatchEntry, BatchJob, BatchManifest, BatchReport, JobOutcome};
pub use classifier::{ClassifierThresholds, DecisionRule, NoiseClassifier};
pub use config::DenoiseConfig;
pub use denoiser::{Classification, DenoiseOutcome, Denoiser, FileReport};
pub use diagnostics::{DiagnosticPaths, DiagnosticsWriter};
pub use error::{DenoiseError, Result};
pub use feature_extractor::{FeatureConfig, FeatureExtractor, FeatureSet};
pub use masks::{
    Band, BandedParams, HardParams, Mask, MaskStrategy, MaskTable, ProtectedHardParams, SoftParams,
};
pub use spectral::{Spectrogram, StftProcessor};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Dominant noise character of a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseCategory {
    Impulsive,
    Clashing,
    Chirp,
    ContinuousLow,
    ContinuousHigh,
}

impl NoiseCategory {
    pub const ALL: [NoiseCategory; 5] = [
        NoiseCategory::Impulsive,
        NoiseCategory::Clashing,
        NoiseCategory::Chirp,
        NoiseCategory::ContinuousLow,
        NoiseCategory::ContinuousHigh,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NoiseCategory::Impulsive => "impulsive",
            NoiseCategory::Clashing => "clashing",
            NoiseCategory::Chirp => "chirp",
            NoiseCategory::ContinuousLow => "continuous_low",
            NoiseCategory::ContinuousHigh => "continuous_high",
        }
    }
}

impl fmt::Display for NoiseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoiseCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        NoiseCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown noise category '{}'", s))
    }
}
