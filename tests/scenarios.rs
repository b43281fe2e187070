use approx::assert_abs_diff_eq;
use rand::{Rng, SeedableRng};
use spectral_mask_denoiser::audio_processor::normalize_peak;
use spectral_mask_denoiser::masks::{magnitude_ratio, soft_mask};
use spectral_mask_denoiser::{
    DecisionRule, DenoiseConfig, Denoiser, MaskTable, NoiseCategory, StftProcessor, Waveform,
};
use std::f64::consts::PI;

const FS: u32 = 16000;

fn tone(freq: f64, amplitude: f64, len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| amplitude * (2.0 * PI * freq * i as f64 / FS as f64).sin())
        .collect()
}

/// Quiet 3 kHz sine with twelve short Nyquist-rate bursts, each inside its
/// own 512-sample frame.
fn sine_with_clicks() -> (Vec<f64>, Vec<f64>) {
    let clean = tone(3000.0, 0.05, 32000);
    let mut noisy = clean.clone();
    for k in 0..12 {
        let start = k * 5 * 512 + 100;
        for i in 0..32 {
            noisy[start + i] += if i % 2 == 0 { 1.0 } else { -1.0 };
        }
    }
    (clean, noisy)
}

fn noise(seed: u64, len: usize) -> Vec<f64> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(-0.5..0.5)).collect()
}

fn denoiser() -> Denoiser {
    Denoiser::new(DenoiseConfig::default()).unwrap()
}

#[test]
fn clicks_over_a_sine_are_impulsive_and_hard_masked() {
    let (clean, noisy) = sine_with_clicks();
    let denoiser = denoiser();

    let classification = denoiser.classify(&Waveform::new(noisy.clone(), FS)).unwrap();
    assert!(classification.features.std_energy > 0.03);
    assert!(classification.features.spike_count >= 10);
    assert!(classification.features.spectral_centroid > 1500.0);
    assert_eq!(classification.category, NoiseCategory::Impulsive);
    assert_eq!(classification.rule, DecisionRule::Impulsive);

    let stft = StftProcessor::new(1024).unwrap();
    let noisy_spec = stft.stft(&normalize_peak(&noisy, 1e-10), FS).unwrap();
    let clean_spec = stft.stft(&normalize_peak(&clean, 1e-10), FS).unwrap();
    let masked = MaskTable::default()
        .strategy_for(NoiseCategory::Impulsive)
        .apply(&noisy_spec, &clean_spec)
        .unwrap();
    let ratio = magnitude_ratio(&noisy_spec, &clean_spec).unwrap();

    let mut zeroed = 0;
    for ((f, t), &r) in ratio.indexed_iter() {
        if r <= 1.3 {
            assert_eq!(masked.data[[f, t]].norm(), 0.0);
            zeroed += 1;
        } else {
            assert_eq!(masked.data[[f, t]], noisy_spec.data[[f, t]]);
        }
    }
    assert!(zeroed > 0);

    let outcome = denoiser
        .denoise(&Waveform::new(clean, FS), &Waveform::new(noisy, FS))
        .unwrap();
    assert_eq!(outcome.category, NoiseCategory::Impulsive);
    assert_eq!(outcome.waveform.len(), 32000);
}

#[test]
fn low_tone_is_continuous_low_with_soft_gains() {
    let signal = tone(250.0, 0.8, 16000);
    let classification = denoiser().classify(&Waveform::new(signal.clone(), FS)).unwrap();

    assert!(classification.features.spectral_centroid < 600.0);
    assert!(classification.features.std_energy < 0.015);
    assert_eq!(classification.category, NoiseCategory::ContinuousLow);

    let stft = StftProcessor::new(1024).unwrap();
    let noisy = stft.stft(&signal, FS).unwrap();
    let louder: Vec<f64> = signal.iter().map(|s| s * 1.2).collect();
    let reference = stft.stft(&louder, FS).unwrap();

    let equal_gains = soft_mask(&noisy, &noisy, 1.1).unwrap().gains;
    let louder_gains = soft_mask(&noisy, &reference, 1.1).unwrap().gains;

    for ((f, t), &magnitude) in noisy.magnitudes().indexed_iter() {
        if magnitude > 1e-3 {
            assert_abs_diff_eq!(equal_gains[[f, t]], 1.0 / 1.1, epsilon = 1e-6);
            assert_eq!(louder_gains[[f, t]], 1.0);
        }
    }
}

#[test]
fn high_steady_tone_is_chirp() {
    // 512 samples hold exactly 224 periods of 7 kHz at 16 kHz.
    let signal = tone(7000.0, 0.5, 16384);
    let waveform = Waveform::new(signal, FS);

    let outcome = denoiser().denoise(&waveform, &waveform).unwrap();
    assert_eq!(outcome.category, NoiseCategory::Chirp);
    assert!(outcome.waveform.samples.iter().all(|s| s.is_finite()));
}

#[test]
fn modulated_mid_tone_is_clashing() {
    let mut signal = tone(2000.0, 1.0, 16 * 2048);
    for (block, chunk) in signal.chunks_mut(2048).enumerate() {
        if block % 2 == 1 {
            chunk.iter_mut().for_each(|s| *s *= 0.5);
        }
    }

    let classification = denoiser().classify(&Waveform::new(signal, FS)).unwrap();
    assert_eq!(classification.features.spike_count, 0);
    assert_eq!(classification.category, NoiseCategory::Clashing);
    assert_eq!(classification.rule, DecisionRule::Clashing);
}

#[test]
fn silence_passes_through_without_errors() {
    let silence = Waveform::new(vec![0.0; 16000], FS);
    let denoiser = denoiser();

    let outcome = denoiser.denoise(&silence, &silence).unwrap();
    assert_eq!(outcome.category, NoiseCategory::ContinuousLow);
    assert_eq!(outcome.waveform.len(), 16000);
    assert!(outcome.waveform.samples.iter().all(|&s| s == 0.0));

    let stft = StftProcessor::new(1024).unwrap();
    let spec = stft.stft(&silence.samples, FS).unwrap();
    let ratio = magnitude_ratio(&spec, &spec).unwrap();
    assert!(ratio.iter().all(|&r| r.abs() < 1e-9));
}

#[test]
fn classification_is_deterministic() {
    let (_, noisy) = sine_with_clicks();
    let waveform = Waveform::new(noisy, FS);
    let denoiser = denoiser();

    assert_eq!(
        denoiser.classify(&waveform).unwrap(),
        denoiser.classify(&waveform).unwrap()
    );
}

#[test]
fn clashing_strategy_gates_then_lifts_the_speech_band() {
    let stft = StftProcessor::new(1024).unwrap();
    let noisy = stft.stft(&noise(1, 16000), FS).unwrap();
    let reference = stft.stft(&noise(2, 16000), FS).unwrap();

    let masked = MaskTable::default()
        .strategy_for(NoiseCategory::Clashing)
        .apply(&noisy, &reference)
        .unwrap();
    let ratio = magnitude_ratio(&noisy, &reference).unwrap();

    let (mut boosted, mut passed, mut zeroed) = (0, 0, 0);
    for ((f, t), &r) in ratio.indexed_iter() {
        let hz = f as f64 * FS as f64 / 1024.0;
        let gain = if r <= 1.35 {
            zeroed += 1;
            0.0
        } else if (300.0..=3400.0).contains(&hz) {
            boosted += 1;
            1.8
        } else {
            passed += 1;
            1.0
        };
        let expected = noisy.data[[f, t]] * gain;
        assert_abs_diff_eq!(masked.data[[f, t]].re, expected.re, epsilon = 1e-12);
        assert_abs_diff_eq!(masked.data[[f, t]].im, expected.im, epsilon = 1e-12);
    }
    assert!(boosted > 0 && passed > 0 && zeroed > 0);
}

#[test]
fn chirp_strategy_splits_soft_and_hard_rows() {
    let stft = StftProcessor::new(1024).unwrap();
    let noisy = stft.stft(&noise(3, 16000), FS).unwrap();
    let reference = stft.stft(&noise(4, 16000), FS).unwrap();
    assert_eq!(noisy.num_bins(), 513);

    let masked = MaskTable::default()
        .strategy_for(NoiseCategory::Chirp)
        .apply(&noisy, &reference)
        .unwrap();
    let ratio = magnitude_ratio(&noisy, &reference).unwrap();

    let (mut soft_rows, mut hard_rows) = (0, 0);
    for ((f, t), &r) in ratio.indexed_iter() {
        let hz = f as f64 * (FS as f64 / 2.0) / 513.0;
        let gain = if (2000.0..=8000.0).contains(&hz) {
            soft_rows += 1;
            (r / 1.15).clamp(0.0, 1.0)
        } else {
            hard_rows += 1;
            if r > 1.35 {
                1.0
            } else {
                0.0
            }
        };
        let expected = noisy.data[[f, t]] * gain;
        assert_abs_diff_eq!(masked.data[[f, t]].re, expected.re, epsilon = 1e-12);
        assert_abs_diff_eq!(masked.data[[f, t]].im, expected.im, epsilon = 1e-12);
    }
    assert!(soft_rows > 0 && hard_rows > 0);
}
