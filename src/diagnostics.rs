//! Diagnostic plots: PSD curve and magnitude spectrogram as PNG images.
//!
//! Observational only; nothing here feeds back into denoising.

use image::{Rgb, RgbImage};
use log::info;
use std::path::{Path, PathBuf};

use crate::error::create_dir_all;
use crate::spectral::StftProcessor;
use crate::{DenoiseError, Result};

const PSD_WIDTH: u32 = 1000;
const PSD_HEIGHT: u32 = 400;
const MARGIN: u32 = 20;
const MAX_SPECTROGRAM_WIDTH: usize = 1200;
/// Dynamic range shown in the spectrogram, in dB below the peak.
const SPECTROGRAM_RANGE_DB: f64 = 80.0;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([120, 120, 120]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);
const TRACE: Rgb<u8> = Rgb([31, 119, 180]);

#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticPaths {
    pub psd: PathBuf,
    pub spectrogram: PathBuf,
}

pub struct DiagnosticsWriter {
    output_dir: PathBuf,
    stft: StftProcessor,
}

impl DiagnosticsWriter {
    pub fn new<P: AsRef<Path>>(output_dir: P, frame_size: usize) -> Result<Self> {
        Ok(Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            stft: StftProcessor::new(frame_size)?,
        })
    }

    /// Writes `<prefix>_psd.png` and `<prefix>_spectrogram.png`.
    pub fn analyze_and_plot(
        &self,
        signal: &[f64],
        sample_rate: u32,
        title: &str,
        prefix: &str,
    ) -> Result<DiagnosticPaths> {
        create_dir_all(&self.output_dir)?;

        let (_, psd) = self.stft.welch_psd(signal, sample_rate)?;
        let psd_path = self.output_dir.join(format!("{}_psd.png", prefix));
        save(&render_psd(&psd), &psd_path)?;

        let spectrogram = self.stft.stft(signal, sample_rate)?;
        let spectrogram_path = self.output_dir.join(format!("{}_spectrogram.png", prefix));
        save(&render_spectrogram(&spectrogram.magnitudes()), &spectrogram_path)?;

        info!(
            "{}: plots for '{}' written to {}",
            title,
            prefix,
            self.output_dir.display()
        );

        Ok(DiagnosticPaths {
            psd: psd_path,
            spectrogram: spectrogram_path,
        })
    }
}

fn save(image: &RgbImage, path: &Path) -> Result<()> {
    image.save(path).map_err(|source| DenoiseError::Plot {
        path: path.to_path_buf(),
        source,
    })
}

/// Semilog line plot of a PSD, frequency on x.
fn render_psd(psd: &[f64]) -> RgbImage {
    let mut image = RgbImage::from_pixel(PSD_WIDTH, PSD_HEIGHT, BACKGROUND);
    let plot_w = PSD_WIDTH - 2 * MARGIN;
    let plot_h = PSD_HEIGHT - 2 * MARGIN;

    for i in 1..4 {
        let y = MARGIN + plot_h * i / 4;
        draw_line(&mut image, (MARGIN, y), (MARGIN + plot_w, y), GRID);
    }
    draw_line(&mut image, (MARGIN, MARGIN), (MARGIN, MARGIN + plot_h), AXIS);
    draw_line(
        &mut image,
        (MARGIN, MARGIN + plot_h),
        (MARGIN + plot_w, MARGIN + plot_h),
        AXIS,
    );

    if psd.len() < 2 {
        return image;
    }

    let floor = f64::MIN_POSITIVE;
    let log_psd: Vec<f64> = psd.iter().map(|&p| p.max(floor).log10()).collect();
    let max = log_psd.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min = log_psd.iter().cloned().fold(f64::INFINITY, f64::min);
    let span = (max - min).max(1e-12);

    let point = |i: usize| {
        let x = MARGIN + (i as f64 / (psd.len() - 1) as f64 * plot_w as f64) as u32;
        let level = (log_psd[i] - min) / span;
        let y = MARGIN + ((1.0 - level) * plot_h as f64) as u32;
        (x, y)
    };

    let mut previous = point(0);
    for i in 1..psd.len() {
        let current = point(i);
        draw_line(&mut image, previous, current, TRACE);
        previous = current;
    }
    image
}

/// dB-scaled magnitude heat map with low frequencies at the bottom.
fn render_spectrogram(magnitudes: &ndarray::Array2<f64>) -> RgbImage {
    let (bins, frames) = magnitudes.dim();
    if bins == 0 || frames == 0 {
        return RgbImage::from_pixel(1, 1, BACKGROUND);
    }

    let width = frames.min(MAX_SPECTROGRAM_WIDTH);
    let peak = magnitudes.iter().cloned().fold(0.0, f64::max);
    let reference = if peak > 0.0 { peak } else { 1.0 };

    let mut image = RgbImage::new(width as u32, bins as u32);
    for x in 0..width {
        let frame = x * frames / width;
        for bin in 0..bins {
            let db = 20.0 * (magnitudes[[bin, frame]] / reference).max(1e-12).log10();
            let level = ((db + SPECTROGRAM_RANGE_DB) / SPECTROGRAM_RANGE_DB).clamp(0.0, 1.0);
            let y = (bins - 1 - bin) as u32;
            image.put_pixel(x as u32, y, heat(level));
        }
    }
    image
}

/// Dark blue → teal → yellow ramp.
fn heat(level: f64) -> Rgb<u8> {
    let stops = [
        (0.0, [68.0, 1.0, 84.0]),
        (0.5, [33.0, 145.0, 140.0]),
        (1.0, [253.0, 231.0, 37.0]),
    ];
    let (lo, hi) = if level <= 0.5 {
        (stops[0], stops[1])
    } else {
        (stops[1], stops[2])
    };
    let t = ((level - lo.0) / (hi.0 - lo.0)).clamp(0.0, 1.0);
    let channel = |i: usize| (lo.1[i] + (hi.1[i] - lo.1[i]) * t).round() as u8;
    Rgb([channel(0), channel(1), channel(2)])
}

fn draw_line(image: &mut RgbImage, from: (u32, u32), to: (u32, u32), color: Rgb<u8>) {
    let (mut x0, mut y0) = (from.0 as i64, from.1 as i64);
    let (x1, y1) = (to.0 as i64, to.1 as i64);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if x0 >= 0 && y0 >= 0 && (x0 as u32) < image.width() && (y0 as u32) < image.height() {
            image.put_pixel(x0 as u32, y0 as u32, color);
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
