use log::{debug, info};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::audio_processor::normalize_peak;
use crate::diagnostics::DiagnosticsWriter;
use crate::{
    AudioProcessor, DecisionRule, DenoiseConfig, DenoiseError, FeatureExtractor, FeatureSet,
    NoiseCategory, NoiseClassifier, Result, StftProcessor, Waveform,
};

/// Features of a noisy recording and the category they map to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    pub category: NoiseCategory,
    pub rule: DecisionRule,
    pub features: FeatureSet,
}

#[derive(Debug, Clone)]
pub struct DenoiseOutcome {
    pub waveform: Waveform,
    pub category: NoiseCategory,
    pub rule: DecisionRule,
    pub features: FeatureSet,
}

/// Summary of one processed file pair.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub original: PathBuf,
    pub noisy: PathBuf,
    pub output: PathBuf,
    pub category: NoiseCategory,
    pub rule: DecisionRule,
    pub features: FeatureSet,
    pub duration_secs: f64,
}

/// Runs the transform → classify → mask → inverse pipeline for file pairs.
///
/// Holds no per-run state, so one instance can serve many pairs concurrently.
pub struct Denoiser {
    config: DenoiseConfig,
    stft: StftProcessor,
    feature_extractor: FeatureExtractor,
    classifier: NoiseClassifier,
    audio_processor: AudioProcessor,
}

impl Denoiser {
    pub fn new(config: DenoiseConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            stft: StftProcessor::new(config.frame_size)?,
            feature_extractor: FeatureExtractor::new(config.features.clone())?,
            classifier: NoiseClassifier::new(config.classifier.clone()),
            audio_processor: AudioProcessor::new(),
            config,
        })
    }

    pub fn config(&self) -> &DenoiseConfig {
        &self.config
    }

    /// Classifies a noisy waveform after peak normalisation.
    pub fn classify(&self, noisy: &Waveform) -> Result<Classification> {
        if noisy.is_empty() {
            return Err(DenoiseError::EmptySignal {
                stage: "noisy input",
            });
        }
        let normalized = normalize_peak(&noisy.samples, self.config.normalize_epsilon);
        self.classify_normalized(&normalized, noisy.sample_rate)
    }

    fn classify_normalized(&self, samples: &[f64], sample_rate: u32) -> Result<Classification> {
        let features = self.feature_extractor.extract(samples, sample_rate)?;
        let (category, rule) = self.classifier.classify_with_rule(&features);
        Ok(Classification {
            category,
            rule,
            features,
        })
    }

    /// Denoises `noisy` using `original` as the reference spectrum.
    ///
    /// Both inputs must be non-empty and share a sample rate. The result is
    /// truncated to the noisy length and scaled to unit peak.
    pub fn denoise(&self, original: &Waveform, noisy: &Waveform) -> Result<DenoiseOutcome> {
        check_pair(original, noisy)?;

        let eps = self.config.normalize_epsilon;
        let sample_rate = noisy.sample_rate;
        let original_norm = normalize_peak(&original.samples, eps);
        let noisy_norm = normalize_peak(&noisy.samples, eps);

        let original_spec = self.stft.stft(&original_norm, sample_rate)?;
        let noisy_spec = self.stft.stft(&noisy_norm, sample_rate)?;

        let Classification {
            category,
            rule,
            features,
        } = self.classify_normalized(&noisy_norm, sample_rate)?;
        info!("Detected noise type: {} (rule: {:?})", category, rule);

        let strategy = self.config.masks.strategy_for(category);
        let masked = strategy.apply(&noisy_spec, &original_spec)?;

        let mut samples = self.stft.istft(&masked)?;
        samples.truncate(noisy.len());
        let samples = normalize_peak(&samples, eps);
        debug!(
            "Reconstructed {} samples from {} frames",
            samples.len(),
            masked.num_frames()
        );

        Ok(DenoiseOutcome {
            waveform: Waveform::new(samples, sample_rate),
            category,
            rule,
            features,
        })
    }

    /// Loads a file and classifies it.
    pub fn classify_file<P: AsRef<Path>>(&self, path: P) -> Result<Classification> {
        let waveform = self.audio_processor.load_waveform(path)?;
        self.classify(&waveform)
    }

    /// Loads a file pair, denoises it and writes 16-bit PCM to `output_path`.
    ///
    /// With `diagnostics`, PSD and spectrogram plots are written for the
    /// noisy, original and denoised signals, named after each file stem.
    pub fn process_file(
        &self,
        original_path: &Path,
        noisy_path: &Path,
        output_path: &Path,
        diagnostics: Option<&DiagnosticsWriter>,
    ) -> Result<FileReport> {
        info!(
            "Processing {} against reference {}",
            noisy_path.display(),
            original_path.display()
        );

        let original = self.audio_processor.load_waveform(original_path)?;
        let noisy = self.audio_processor.load_waveform(noisy_path)?;
        check_pair(&original, &noisy)?;

        if let Some(writer) = diagnostics {
            let eps = self.config.normalize_epsilon;
            writer.analyze_and_plot(
                &normalize_peak(&noisy.samples, eps),
                noisy.sample_rate,
                "Noisy signal",
                &file_stem(noisy_path),
            )?;
            writer.analyze_and_plot(
                &normalize_peak(&original.samples, eps),
                original.sample_rate,
                "Original signal",
                &file_stem(original_path),
            )?;
        }

        let outcome = self.denoise(&original, &noisy)?;

        if let Some(writer) = diagnostics {
            writer.analyze_and_plot(
                &outcome.waveform.samples,
                outcome.waveform.sample_rate,
                "Denoised signal",
                &file_stem(output_path),
            )?;
        }

        self.audio_processor
            .save_waveform(output_path, &outcome.waveform)?;
        info!(
            "Saved {} (detected noise type: {})",
            output_path.display(),
            outcome.category
        );

        Ok(FileReport {
            original: original_path.to_path_buf(),
            noisy: noisy_path.to_path_buf(),
            output: output_path.to_path_buf(),
            category: outcome.category,
            rule: outcome.rule,
            features: outcome.features,
            duration_secs: outcome.waveform.duration_secs(),
        })
    }
}

fn check_pair(original: &Waveform, noisy: &Waveform) -> Result<()> {
    if original.is_empty() {
        return Err(DenoiseError::EmptySignal {
            stage: "original input",
        });
    }
    if noisy.is_empty() {
        return Err(DenoiseError::EmptySignal {
            stage: "noisy input",
        });
    }
    if original.sample_rate != noisy.sample_rate {
        return Err(DenoiseError::SampleRateMismatch {
            original: original.sample_rate,
            noisy: noisy.sample_rate,
        });
    }
    Ok(())
}

/// File name up to the first dot, used as the plot prefix.
fn file_stem(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("signal")
        .to_string()
}
