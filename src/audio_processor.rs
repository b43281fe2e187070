use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::debug;
use std::path::Path;

use crate::error::create_dir_all;
use crate::{DenoiseError, Result};

/// Mono waveform with its sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f64>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f64>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn peak(&self) -> f64 {
        peak(&self.samples)
    }
}

pub fn peak(samples: &[f64]) -> f64 {
    samples.iter().map(|s| s.abs()).fold(0.0, f64::max)
}

/// Divides every sample by `max|x| + epsilon`.
///
/// Silence stays silence: an all-zero input maps to all zeros.
pub fn normalize_peak(samples: &[f64], epsilon: f64) -> Vec<f64> {
    let scale = peak(samples) + epsilon;
    samples.iter().map(|&s| s / scale).collect()
}

/// Reads and writes the WAV files the batch driver works on.
pub struct AudioProcessor;

impl AudioProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Loads a WAV file as a mono waveform.
    ///
    /// Integer PCM is scaled by `2^(bits-1)`; multi-channel audio is
    /// averaged down to one channel.
    pub fn load_waveform<P: AsRef<Path>>(&self, path: P) -> Result<Waveform> {
        let path = path.as_ref();
        let load_err = |source| DenoiseError::Load {
            path: path.to_path_buf(),
            source,
        };

        let reader = WavReader::open(path).map_err(load_err)?;
        let spec = reader.spec();

        let interleaved: Vec<f64> = match spec.sample_format {
            SampleFormat::Float => reader
                .into_samples::<f32>()
                .map(|s| s.map(|v| v as f64))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(load_err)?,
            SampleFormat::Int => {
                let max_val = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f64;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f64 / max_val))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(load_err)?
            }
        };

        let samples = self.downmix(&interleaved, spec.channels as usize);
        debug!(
            "Loaded {} ({} ch, {} Hz, {} frames)",
            path.display(),
            spec.channels,
            spec.sample_rate,
            samples.len()
        );

        Ok(Waveform::new(samples, spec.sample_rate))
    }

    /// Writes a waveform as mono 16-bit PCM, creating parent directories.
    pub fn save_waveform<P: AsRef<Path>>(&self, path: P, waveform: &Waveform) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent)?;
            }
        }

        let write_err = |source| DenoiseError::Write {
            path: path.to_path_buf(),
            source,
        };

        let spec = WavSpec {
            channels: 1,
            sample_rate: waveform.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).map_err(write_err)?;
        for &sample in &waveform.samples {
            let pcm = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
            writer.write_sample(pcm).map_err(write_err)?;
        }
        writer.finalize().map_err(write_err)?;

        Ok(())
    }

    fn downmix(&self, interleaved: &[f64], channels: usize) -> Vec<f64> {
        if channels <= 1 {
            return interleaved.to_vec();
        }
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f64>() / channels as f64)
            .collect()
    }
}

impl Default for AudioProcessor {
    fn default() -> Self {
        Self::new()
    }
}
