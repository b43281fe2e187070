use log::debug;
use serde::{Deserialize, Serialize};

use crate::spectral::StftProcessor;
use crate::{DenoiseError, Result};

/// Framing and guard constants for feature extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Welch segment length
    pub psd_frame_size: usize,
    /// Non-overlapping window used for frame energies
    pub energy_frame_size: usize,
    /// A frame is a spike when its energy exceeds `spike_factor × mean`
    pub spike_factor: f64,
    pub centroid_epsilon: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            psd_frame_size: 1024,
            energy_frame_size: 512,
            spike_factor: 3.0,
            centroid_epsilon: 1e-10,
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<()> {
        if self.energy_frame_size == 0 {
            return Err(DenoiseError::InvalidConfig(
                "energy_frame_size must be positive".into(),
            ));
        }
        if !(self.spike_factor.is_finite() && self.spike_factor > 0.0) {
            return Err(DenoiseError::InvalidConfig(format!(
                "spike_factor must be positive, got {}",
                self.spike_factor
            )));
        }
        Ok(())
    }
}

/// Scalar descriptors of a noisy recording.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    /// Mean squared amplitude
    pub energy: f64,
    /// Frequency of the PSD maximum, Hz
    pub dominant_frequency: f64,
    /// PSD-weighted mean frequency, Hz
    pub spectral_centroid: f64,
    /// Population standard deviation of frame energies
    pub std_energy: f64,
    /// Frames whose energy exceeds the spike threshold
    pub spike_count: usize,
}

pub struct FeatureExtractor {
    config: FeatureConfig,
    psd: StftProcessor,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Result<Self> {
        config.validate()?;
        let psd = StftProcessor::new(config.psd_frame_size)?;
        Ok(Self { config, psd })
    }

    pub fn extract(&self, signal: &[f64], sample_rate: u32) -> Result<FeatureSet> {
        if signal.is_empty() {
            return Err(DenoiseError::EmptySignal {
                stage: "feature extraction",
            });
        }

        let energy = signal.iter().map(|s| s * s).sum::<f64>() / signal.len() as f64;

        let (freqs, psd) = self.psd.welch_psd(signal, sample_rate)?;
        let dominant_frequency = freqs[argmax(&psd)];
        let weighted: f64 = freqs.iter().zip(&psd).map(|(f, p)| f * p).sum();
        let total: f64 = psd.iter().sum();
        let spectral_centroid = weighted / (total + self.config.centroid_epsilon);

        let frame_energies = self.frame_energies(signal);
        let (mean, std_energy) = mean_and_std(&frame_energies);
        let spike_threshold = self.config.spike_factor * mean;
        let spike_count = frame_energies
            .iter()
            .filter(|&&e| e > spike_threshold)
            .count();

        let features = FeatureSet {
            energy,
            dominant_frequency,
            spectral_centroid,
            std_energy,
            spike_count,
        };
        debug!("Extracted features: {:?}", features);

        Ok(features)
    }

    /// Energy of each complete non-overlapping frame; the remainder is dropped.
    pub fn frame_energies(&self, signal: &[f64]) -> Vec<f64> {
        signal
            .chunks_exact(self.config.energy_frame_size)
            .map(|frame| frame.iter().map(|s| s * s).sum())
            .collect()
    }
}

/// Index of the first maximum.
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}
