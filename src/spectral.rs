//! Short-time Fourier analysis: STFT, inverse STFT and Welch PSD.
//!
//! Framing follows the conventional SciPy defaults so spectrograms of
//! two recordings line up bin-for-bin: periodic Hann window, 50% overlap,
//! zero boundary extension of half a frame on each side, zero padding
//! to a whole number of hops, and one-sided spectra scaled by 1/Σw.

use ndarray::Array2;
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

use crate::{DenoiseError, Result};

/// Normaliser floor below which overlap-add samples are left unscaled.
const OLA_FLOOR: f64 = 1e-10;

/// Complex time-frequency matrix plus the framing it was computed with.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    /// Frequency-major `[bin, frame]` layout.
    pub data: Array2<Complex64>,
    /// Centre frequency of each bin in Hz.
    pub frequencies: Vec<f64>,
    /// Frame times in seconds.
    pub times: Vec<f64>,
    pub sample_rate: u32,
    pub frame_size: usize,
}

impl Spectrogram {
    pub fn num_bins(&self) -> usize {
        self.data.nrows()
    }

    pub fn num_frames(&self) -> usize {
        self.data.ncols()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn magnitudes(&self) -> Array2<f64> {
        self.data.mapv(|c| c.norm())
    }

    /// Same data with a new matrix, keeping the framing metadata.
    pub fn with_data(&self, data: Array2<Complex64>) -> Self {
        Self {
            data,
            frequencies: self.frequencies.clone(),
            times: self.times.clone(),
            sample_rate: self.sample_rate,
            frame_size: self.frame_size,
        }
    }
}

/// Periodic Hann window (the spectral-analysis variant, `N` in the denominator).
pub fn periodic_hann(n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => (0..n)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos())
            .collect(),
    }
}

/// STFT/ISTFT/PSD engine for one frame size.
pub struct StftProcessor {
    frame_size: usize,
    hop: usize,
    window: Vec<f64>,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl StftProcessor {
    pub fn new(frame_size: usize) -> Result<Self> {
        if frame_size < 2 || frame_size % 2 != 0 {
            return Err(DenoiseError::InvalidConfig(format!(
                "frame size must be an even number >= 2, got {}",
                frame_size
            )));
        }

        let mut planner = FftPlanner::<f64>::new();
        Ok(Self {
            frame_size,
            hop: frame_size / 2,
            window: periodic_hann(frame_size),
            forward: planner.plan_fft_forward(frame_size),
            inverse: planner.plan_fft_inverse(frame_size),
        })
    }

    pub fn num_bins(&self) -> usize {
        self.frame_size / 2 + 1
    }

    /// One-sided bin centre frequencies for this frame size.
    pub fn frequencies(&self, sample_rate: u32) -> Vec<f64> {
        onesided_freqs(self.frame_size, sample_rate as f64)
    }

    pub fn stft(&self, signal: &[f64], sample_rate: u32) -> Result<Spectrogram> {
        if signal.is_empty() {
            return Err(DenoiseError::EmptySignal { stage: "stft" });
        }

        let n = self.frame_size;
        let ext = n / 2;

        // Boundary extension on both sides, then pad the tail to a whole hop.
        let extended_len = signal.len() + 2 * ext;
        let remainder = (extended_len - n) % self.hop;
        let tail = if remainder == 0 { 0 } else { self.hop - remainder };
        let mut padded = vec![0.0; extended_len + tail];
        padded[ext..ext + signal.len()].copy_from_slice(signal);

        let num_frames = (padded.len() - n) / self.hop + 1;
        let num_bins = self.num_bins();
        let scale = 1.0 / self.window.iter().sum::<f64>();

        let mut data = Array2::<Complex64>::zeros((num_bins, num_frames));
        let mut buffer = vec![Complex64::new(0.0, 0.0); n];

        for frame in 0..num_frames {
            let start = frame * self.hop;
            for (i, slot) in buffer.iter_mut().enumerate() {
                *slot = Complex64::new(padded[start + i] * self.window[i], 0.0);
            }
            self.forward.process(&mut buffer);
            for bin in 0..num_bins {
                data[[bin, frame]] = buffer[bin] * scale;
            }
        }

        let times = (0..num_frames)
            .map(|frame| (frame * self.hop) as f64 / sample_rate as f64)
            .collect();

        Ok(Spectrogram {
            data,
            frequencies: self.frequencies(sample_rate),
            times,
            sample_rate,
            frame_size: n,
        })
    }

    /// Inverse of [`StftProcessor::stft`]; the output still carries the
    /// tail padding, so callers truncate to the original length.
    pub fn istft(&self, spectrogram: &Spectrogram) -> Result<Vec<f64>> {
        let n = self.frame_size;
        let (num_bins, num_frames) = spectrogram.shape();
        if num_bins != self.num_bins() {
            return Err(DenoiseError::ShapeMismatch {
                stage: "istft",
                expected: (self.num_bins(), num_frames),
                got: (num_bins, num_frames),
            });
        }
        if num_frames == 0 {
            return Err(DenoiseError::EmptySignal { stage: "istft" });
        }

        let out_len = n + self.hop * (num_frames - 1);
        let mut output = vec![0.0; out_len];
        let mut norm = vec![0.0; out_len];
        let win_sum = self.window.iter().sum::<f64>();
        let inv_n = 1.0 / n as f64;
        let mut buffer = vec![Complex64::new(0.0, 0.0); n];

        for frame in 0..num_frames {
            // Rebuild the Hermitian-symmetric full spectrum.
            for bin in 0..num_bins {
                buffer[bin] = spectrogram.data[[bin, frame]];
            }
            for k in 1..n / 2 {
                buffer[n - k] = buffer[k].conj();
            }
            // Real-valued frame: DC and Nyquist carry no imaginary part.
            buffer[0].im = 0.0;
            buffer[n / 2].im = 0.0;

            self.inverse.process(&mut buffer);

            let offset = frame * self.hop;
            for i in 0..n {
                let sample = buffer[i].re * inv_n * win_sum;
                output[offset + i] += sample * self.window[i];
                norm[offset + i] += self.window[i] * self.window[i];
            }
        }

        for (sample, weight) in output.iter_mut().zip(&norm) {
            if *weight > OLA_FLOOR {
                *sample /= *weight;
            }
        }

        let ext = n / 2;
        Ok(output[ext..out_len - ext].to_vec())
    }

    /// Welch power spectral density estimate, density-scaled.
    ///
    /// Segments shorter than the frame size are used when the signal
    /// itself is shorter.
    pub fn welch_psd(&self, signal: &[f64], sample_rate: u32) -> Result<(Vec<f64>, Vec<f64>)> {
        if signal.is_empty() {
            return Err(DenoiseError::EmptySignal { stage: "welch_psd" });
        }

        let nperseg = self.frame_size.min(signal.len());
        let fft = if nperseg == self.frame_size {
            Arc::clone(&self.forward)
        } else {
            FftPlanner::<f64>::new().plan_fft_forward(nperseg)
        };

        let fs = sample_rate as f64;
        let step = (nperseg - nperseg / 2).max(1);
        let window = periodic_hann(nperseg);
        let scale = 1.0 / (fs * window.iter().map(|w| w * w).sum::<f64>());
        let num_bins = nperseg / 2 + 1;
        let num_segments = (signal.len() - nperseg) / step + 1;

        let mut psd = vec![0.0; num_bins];
        let mut buffer = vec![Complex64::new(0.0, 0.0); nperseg];

        for segment in 0..num_segments {
            let chunk = &signal[segment * step..segment * step + nperseg];
            let mean = chunk.iter().sum::<f64>() / nperseg as f64;
            for (i, slot) in buffer.iter_mut().enumerate() {
                *slot = Complex64::new((chunk[i] - mean) * window[i], 0.0);
            }
            fft.process(&mut buffer);

            for (bin, acc) in psd.iter_mut().enumerate() {
                let mut power = buffer[bin].norm_sqr() * scale;
                let is_nyquist = nperseg % 2 == 0 && bin == nperseg / 2;
                if bin != 0 && !is_nyquist {
                    power *= 2.0;
                }
                *acc += power;
            }
        }

        let inv = 1.0 / num_segments as f64;
        psd.iter_mut().for_each(|p| *p *= inv);

        Ok((onesided_freqs(nperseg, fs), psd))
    }
}

fn onesided_freqs(nfft: usize, fs: f64) -> Vec<f64> {
    (0..nfft / 2 + 1)
        .map(|k| k as f64 * fs / nfft as f64)
        .collect()
}
