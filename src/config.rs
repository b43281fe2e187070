//! Pipeline configuration
//!
//! Every constant the pipeline uses lives here so classifier thresholds and
//! mask parameters can be tuned without touching code. `Default`
//! reproduces the stock tables; a JSON file may override any subset.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::classifier::ClassifierThresholds;
use crate::feature_extractor::FeatureConfig;
use crate::masks::MaskTable;
use crate::{DenoiseError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenoiseConfig {
    /// STFT frame size shared by every spectrogram in a run
    pub frame_size: usize,
    /// Floor added to the peak before amplitude normalisation
    pub normalize_epsilon: f64,
    pub features: FeatureConfig,
    pub classifier: ClassifierThresholds,
    pub masks: MaskTable,
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self {
            frame_size: 1024,
            normalize_epsilon: 1e-10,
            features: FeatureConfig::default(),
            classifier: ClassifierThresholds::default(),
            masks: MaskTable::default(),
        }
    }
}

impl DenoiseConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_size < 2 || self.frame_size % 2 != 0 {
            return Err(DenoiseError::InvalidConfig(format!(
                "frame_size must be an even number >= 2, got {}",
                self.frame_size
            )));
        }
        if !(self.normalize_epsilon.is_finite() && self.normalize_epsilon > 0.0) {
            return Err(DenoiseError::InvalidConfig(format!(
                "normalize_epsilon must be positive, got {}",
                self.normalize_epsilon
            )));
        }
        self.features.validate()?;
        self.classifier.validate()?;
        self.masks.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::masks::{HardParams, MaskStrategy, SoftParams};
    use crate::NoiseCategory;

    #[test]
    fn default_is_valid() {
        DenoiseConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = DenoiseConfig::from_json_str(
            r#"{ "masks": { "impulsive": { "threshold": 1.5 } } }"#,
        )
        .unwrap();

        assert_eq!(config.frame_size, 1024);
        assert_eq!(
            config.masks.strategy_for(NoiseCategory::Impulsive),
            MaskStrategy::Hard(HardParams { threshold: 1.5 })
        );
        assert_eq!(config.masks.continuous_low, SoftParams { threshold: 1.1 });
        assert_eq!(config.classifier, ClassifierThresholds::default());
    }

    #[test]
    fn pretty_json_round_trips() {
        let config = DenoiseConfig::default();
        let json = config.to_json_pretty().unwrap();
        assert_eq!(DenoiseConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn rejects_odd_frame_size() {
        let err = DenoiseConfig::from_json_str(r#"{ "frame_size": 1023 }"#).unwrap_err();
        assert!(matches!(err, DenoiseError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_non_positive_threshold() {
        let err = DenoiseConfig::from_json_str(
            r#"{ "masks": { "chirp": { "soft_threshold": 0.0, "hard_threshold": 1.35,
                 "band": { "low_hz": 2000.0, "high_hz": 8000.0 } } } }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("soft_threshold"));
    }

    #[test]
    fn mask_kind_is_not_configurable() {
        let err = DenoiseConfig::from_json_str(
            r#"{ "masks": { "clashing": { "type": "soft", "threshold": 1.2 } } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, DenoiseError::Json(_)));
        assert!(matches!(
            DenoiseConfig::default()
                .masks
                .strategy_for(NoiseCategory::Clashing),
            MaskStrategy::ProtectedHard(_)
        ));
    }
}
