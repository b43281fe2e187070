// Classifier - rule-based noise categorisation
//
// Maps a FeatureSet onto a NoiseCategory with a fixed decision list. The
// bands of the rules overlap, so evaluation order is part of the contract:
// the first matching rule wins and the final fallback covers whatever the
// earlier rules leave (centroids between the clashing and chirp bands).

use serde::{Deserialize, Serialize};

use crate::feature_extractor::FeatureSet;
use crate::{DenoiseError, NoiseCategory, Result};

/// Decision thresholds, in rule order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierThresholds {
    pub impulsive_min_std: f64,
    pub impulsive_min_spikes: usize,
    pub impulsive_centroid: f64,
    /// Lower centroid accepted when frame energies are extremely unsteady
    pub impulsive_alt_centroid: f64,
    pub impulsive_alt_min_std: f64,

    pub clashing_centroid_low: f64,
    pub clashing_centroid_high: f64,
    pub clashing_min_std: f64,

    pub chirp_centroid: f64,

    pub continuous_low_centroid: f64,
    pub continuous_high_centroid: f64,

    pub fallback_low_max_std: f64,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            impulsive_min_std: 0.03,
            impulsive_min_spikes: 10,
            impulsive_centroid: 1500.0,
            impulsive_alt_centroid: 500.0,
            impulsive_alt_min_std: 18.0,

            clashing_centroid_low: 1500.0,
            clashing_centroid_high: 4500.0,
            clashing_min_std: 0.02,

            chirp_centroid: 6000.0,

            continuous_low_centroid: 600.0,
            continuous_high_centroid: 1500.0,

            fallback_low_max_std: 0.015,
        }
    }
}

impl ClassifierThresholds {
    pub fn validate(&self) -> Result<()> {
        if self.clashing_centroid_low >= self.clashing_centroid_high {
            return Err(DenoiseError::InvalidConfig(format!(
                "clashing band is empty: {} >= {}",
                self.clashing_centroid_low, self.clashing_centroid_high
            )));
        }
        if self.continuous_low_centroid > self.continuous_high_centroid {
            return Err(DenoiseError::InvalidConfig(format!(
                "continuous bands are inverted: {} > {}",
                self.continuous_low_centroid, self.continuous_high_centroid
            )));
        }
        Ok(())
    }
}

/// Which branch of the decision list produced a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionRule {
    Impulsive,
    Clashing,
    Chirp,
    ContinuousLow,
    ContinuousHigh,
    Fallback,
}

pub struct NoiseClassifier {
    thresholds: ClassifierThresholds,
}

impl NoiseClassifier {
    pub fn new(thresholds: ClassifierThresholds) -> Self {
        Self { thresholds }
    }

    pub fn classify(&self, features: &FeatureSet) -> NoiseCategory {
        self.classify_with_rule(features).0
    }

    /// Classify and report the rule that fired.
    ///
    /// Rules, first match wins:
    /// 1. Impulsive: unsteady frame energy with enough spikes and a bright centroid
    /// 2. Clashing: mid-band centroid with unsteady frame energy
    /// 3. Chirp: very high centroid
    /// 4. ContinuousLow: low centroid
    /// 5. ContinuousHigh: low-mid centroid
    /// 6. Fallback: split on frame-energy steadiness
    pub fn classify_with_rule(&self, features: &FeatureSet) -> (NoiseCategory, DecisionRule) {
        let t = &self.thresholds;
        let centroid = features.spectral_centroid;
        let std_energy = features.std_energy;

        let bright = centroid > t.impulsive_centroid
            || (centroid > t.impulsive_alt_centroid && std_energy > t.impulsive_alt_min_std);
        if std_energy > t.impulsive_min_std && features.spike_count >= t.impulsive_min_spikes && bright
        {
            return (NoiseCategory::Impulsive, DecisionRule::Impulsive);
        }

        if t.clashing_centroid_low < centroid
            && centroid < t.clashing_centroid_high
            && std_energy > t.clashing_min_std
        {
            return (NoiseCategory::Clashing, DecisionRule::Clashing);
        }

        if centroid > t.chirp_centroid {
            return (NoiseCategory::Chirp, DecisionRule::Chirp);
        }

        if centroid < t.continuous_low_centroid {
            return (NoiseCategory::ContinuousLow, DecisionRule::ContinuousLow);
        }

        if t.continuous_low_centroid <= centroid && centroid < t.continuous_high_centroid {
            return (NoiseCategory::ContinuousHigh, DecisionRule::ContinuousHigh);
        }

        if std_energy < t.fallback_low_max_std {
            (NoiseCategory::ContinuousLow, DecisionRule::Fallback)
        } else {
            (NoiseCategory::ContinuousHigh, DecisionRule::Fallback)
        }
    }
}

impl Default for NoiseClassifier {
    fn default() -> Self {
        Self::new(ClassifierThresholds::default())
    }
}
