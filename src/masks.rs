//! Spectral masks driven by a reference ("clean") spectrogram.
//!
//! Every mask compares the reference and noisy magnitudes bin by bin:
//! `ratio[f, t] = |reference[f, t]| / (|noisy[f, t]| + ε)`. The reference
//! is an oracle input, so these masks serve paired-corpus evaluation and
//! cannot run on a noisy recording alone.

use log::debug;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::spectral::Spectrogram;
use crate::{DenoiseError, NoiseCategory, Result};

/// Guards the ratio denominator.
pub const RATIO_EPSILON: f64 = 1e-10;

/// Real-valued gain per `[bin, frame]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    pub gains: Array2<f64>,
}

impl Mask {
    pub fn shape(&self) -> (usize, usize) {
        self.gains.dim()
    }

    /// Multiplies the noisy spectrogram by the gains, bin by bin.
    pub fn apply(&self, noisy: &Spectrogram) -> Result<Spectrogram> {
        check_shape("mask application", self.shape(), noisy.shape())?;

        let (bins, frames) = self.shape();
        let mut masked = noisy.data.clone();
        for f in 0..bins {
            for t in 0..frames {
                masked[[f, t]] *= self.gains[[f, t]];
            }
        }
        Ok(noisy.with_data(masked))
    }
}

/// Inclusive frequency band in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub low_hz: f64,
    pub high_hz: f64,
}

impl Band {
    pub const fn new(low_hz: f64, high_hz: f64) -> Self {
        Self { low_hz, high_hz }
    }

    pub fn contains(&self, hz: f64) -> bool {
        self.low_hz <= hz && hz <= self.high_hz
    }
}

fn check_shape(stage: &'static str, expected: (usize, usize), got: (usize, usize)) -> Result<()> {
    if expected != got {
        return Err(DenoiseError::ShapeMismatch {
            stage,
            expected,
            got,
        });
    }
    Ok(())
}

/// `|reference| / (|noisy| + ε)` for every bin.
pub fn magnitude_ratio(noisy: &Spectrogram, reference: &Spectrogram) -> Result<Array2<f64>> {
    check_shape("magnitude ratio", noisy.shape(), reference.shape())?;

    let (bins, frames) = noisy.shape();
    let mut ratio = Array2::zeros((bins, frames));
    for f in 0..bins {
        for t in 0..frames {
            ratio[[f, t]] =
                reference.data[[f, t]].norm() / (noisy.data[[f, t]].norm() + RATIO_EPSILON);
        }
    }
    Ok(ratio)
}

fn hard_gain(ratio: f64, threshold: f64) -> f64 {
    if ratio > threshold {
        1.0
    } else {
        0.0
    }
}

fn soft_gain(ratio: f64, threshold: f64) -> f64 {
    (ratio / threshold).clamp(0.0, 1.0)
}

/// Keep a bin only where the reference dominates by more than `threshold`.
pub fn hard_mask(noisy: &Spectrogram, reference: &Spectrogram, threshold: f64) -> Result<Mask> {
    let gains = magnitude_ratio(noisy, reference)?.mapv(|r| hard_gain(r, threshold));
    Ok(Mask { gains })
}

/// Gain proportional to the ratio, saturating at 1 once `ratio >= threshold`.
pub fn soft_mask(noisy: &Spectrogram, reference: &Spectrogram, threshold: f64) -> Result<Mask> {
    let gains = magnitude_ratio(noisy, reference)?.mapv(|r| soft_gain(r, threshold));
    Ok(Mask { gains })
}

/// Soft gain inside `band`, hard gating everywhere else.
///
/// Bin `f` maps to `f × (sample_rate / 2) / num_bins` Hz. The switch is per
/// row: every frame of a bin uses the same rule.
pub fn banded_mask(
    noisy: &Spectrogram,
    reference: &Spectrogram,
    soft_threshold: f64,
    hard_threshold: f64,
    band: Band,
) -> Result<Mask> {
    let ratio = magnitude_ratio(noisy, reference)?;
    let (bins, frames) = ratio.dim();
    let nyquist = noisy.sample_rate as f64 / 2.0;

    let mut gains = Array2::zeros((bins, frames));
    for f in 0..bins {
        let hz = f as f64 * nyquist / bins as f64;
        let in_band = band.contains(hz);
        for t in 0..frames {
            let r = ratio[[f, t]];
            gains[[f, t]] = if in_band {
                soft_gain(r, soft_threshold)
            } else {
                hard_gain(r, hard_threshold)
            };
        }
    }
    Ok(Mask { gains })
}

/// Boosts every bin whose frequency lies in `band` by `1 + boost`.
///
/// Works on an already masked spectrogram and returns a modified copy;
/// bins outside the band are untouched.
pub fn protect_speech_band(
    masked: &Spectrogram,
    frequencies: &[f64],
    band: Band,
    boost: f64,
) -> Result<Spectrogram> {
    let (bins, frames) = masked.shape();
    if frequencies.len() != bins {
        return Err(DenoiseError::ShapeMismatch {
            stage: "speech band protection",
            expected: (bins, frames),
            got: (frequencies.len(), frames),
        });
    }

    let factor = 1.0 + boost;
    let mut protected = masked.data.clone();
    for (f, &hz) in frequencies.iter().enumerate() {
        if !band.contains(hz) {
            continue;
        }
        for t in 0..frames {
            protected[[f, t]] *= factor;
        }
    }
    Ok(masked.with_data(protected))
}

/// Hard gating parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HardParams {
    pub threshold: f64,
}

/// Soft (clipped ratio) parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SoftParams {
    pub threshold: f64,
}

/// Soft inside `band`, hard outside it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BandedParams {
    pub soft_threshold: f64,
    pub hard_threshold: f64,
    pub band: Band,
}

/// Hard gating followed by a `1 + boost` lift of the speech band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtectedHardParams {
    pub threshold: f64,
    pub boost: f64,
    pub speech_band: Band,
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(DenoiseError::InvalidConfig(format!(
            "{} must be positive, got {}",
            name, value
        )))
    }
}

fn ordered(band: &Band) -> Result<()> {
    if band.low_hz <= band.high_hz {
        Ok(())
    } else {
        Err(DenoiseError::InvalidConfig(format!(
            "band is inverted: {} > {}",
            band.low_hz, band.high_hz
        )))
    }
}

impl HardParams {
    fn validate(&self) -> Result<()> {
        positive("threshold", self.threshold)
    }
}

impl SoftParams {
    fn validate(&self) -> Result<()> {
        positive("threshold", self.threshold)
    }
}

impl BandedParams {
    fn validate(&self) -> Result<()> {
        positive("soft_threshold", self.soft_threshold)?;
        positive("hard_threshold", self.hard_threshold)?;
        ordered(&self.band)
    }
}

impl ProtectedHardParams {
    fn validate(&self) -> Result<()> {
        positive("threshold", self.threshold)?;
        if self.boost < 0.0 {
            return Err(DenoiseError::InvalidConfig(format!(
                "boost must be non-negative, got {}",
                self.boost
            )));
        }
        ordered(&self.speech_band)
    }
}

/// A mask recipe with its parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaskStrategy {
    Hard(HardParams),
    Soft(SoftParams),
    Banded(BandedParams),
    ProtectedHard(ProtectedHardParams),
}

impl MaskStrategy {
    /// Builds the mask and returns the masked noisy spectrogram.
    pub fn apply(&self, noisy: &Spectrogram, reference: &Spectrogram) -> Result<Spectrogram> {
        debug!("Applying mask strategy {:?}", self);
        match *self {
            MaskStrategy::Hard(p) => hard_mask(noisy, reference, p.threshold)?.apply(noisy),
            MaskStrategy::Soft(p) => soft_mask(noisy, reference, p.threshold)?.apply(noisy),
            MaskStrategy::Banded(p) => {
                banded_mask(noisy, reference, p.soft_threshold, p.hard_threshold, p.band)?
                    .apply(noisy)
            }
            MaskStrategy::ProtectedHard(p) => {
                let masked = hard_mask(noisy, reference, p.threshold)?.apply(noisy)?;
                protect_speech_band(&masked, &noisy.frequencies, p.speech_band, p.boost)
            }
        }
    }
}

/// Per-category mask parameters.
///
/// The mask kind of each category is fixed by the field type; configuration
/// can only tune its thresholds, boost and bands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MaskTable {
    pub impulsive: HardParams,
    pub clashing: ProtectedHardParams,
    pub chirp: BandedParams,
    pub continuous_low: SoftParams,
    pub continuous_high: SoftParams,
}

impl Default for MaskTable {
    fn default() -> Self {
        Self {
            impulsive: HardParams { threshold: 1.3 },
            clashing: ProtectedHardParams {
                threshold: 1.35,
                boost: 0.8,
                speech_band: Band::new(300.0, 3400.0),
            },
            chirp: BandedParams {
                soft_threshold: 1.15,
                hard_threshold: 1.35,
                band: Band::new(2000.0, 8000.0),
            },
            continuous_low: SoftParams { threshold: 1.1 },
            continuous_high: SoftParams { threshold: 1.2 },
        }
    }
}

impl MaskTable {
    pub fn strategy_for(&self, category: NoiseCategory) -> MaskStrategy {
        match category {
            NoiseCategory::Impulsive => MaskStrategy::Hard(self.impulsive),
            NoiseCategory::Clashing => MaskStrategy::ProtectedHard(self.clashing),
            NoiseCategory::Chirp => MaskStrategy::Banded(self.chirp),
            NoiseCategory::ContinuousLow => MaskStrategy::Soft(self.continuous_low),
            NoiseCategory::ContinuousHigh => MaskStrategy::Soft(self.continuous_high),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.impulsive.validate()?;
        self.clashing.validate()?;
        self.chirp.validate()?;
        self.continuous_low.validate()?;
        self.continuous_high.validate()
    }
}
