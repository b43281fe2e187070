use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use rand::{Rng, SeedableRng};
use spectral_mask_denoiser::{
    run_batch, AudioProcessor, BatchJob, DenoiseConfig, Denoiser, DiagnosticsWriter,
};
use std::f64::consts::PI;
use std::path::Path;
use std::sync::Arc;

const FS: u32 = 16000;

fn write_wav(path: &Path, channels: &[Vec<f64>], sample_rate: u32) {
    let spec = WavSpec {
        channels: channels.len() as u16,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).unwrap();
    for i in 0..channels[0].len() {
        for channel in channels {
            writer
                .write_sample((channel[i].clamp(-1.0, 1.0) * 32767.0) as i16)
                .unwrap();
        }
    }
    writer.finalize().unwrap();
}

fn speech_like_pair(len: usize) -> (Vec<f64>, Vec<f64>) {
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    let clean: Vec<f64> = (0..len)
        .map(|i| {
            let t = i as f64 / FS as f64;
            0.4 * (2.0 * PI * 220.0 * t).sin() + 0.2 * (2.0 * PI * 1100.0 * t).sin()
        })
        .collect();
    let noisy = clean
        .iter()
        .map(|s| s + rng.gen_range(-0.05..0.05))
        .collect();
    (clean, noisy)
}

#[test]
fn process_file_writes_pcm_and_plots() {
    let dir = tempfile::tempdir().unwrap();
    let (clean, noisy) = speech_like_pair(24000);
    let original_path = dir.path().join("0_ORIGINAL.wav");
    let noisy_path = dir.path().join("0_NOISY.wav");
    let output_path = dir.path().join("cleaned").join("0_SUPER_CLEANED.wav");
    write_wav(&original_path, &[clean], FS);
    write_wav(&noisy_path, &[noisy], FS);

    let denoiser = Denoiser::new(DenoiseConfig::default()).unwrap();
    let plots = DiagnosticsWriter::new(dir.path().join("plots"), 1024).unwrap();
    let report = denoiser
        .process_file(&original_path, &noisy_path, &output_path, Some(&plots))
        .unwrap();

    let expected = denoiser.classify_file(&noisy_path).unwrap();
    assert_eq!(report.category, expected.category);

    let reader = WavReader::open(&output_path).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(spec.sample_rate, FS);
    assert_eq!(reader.len(), 24000);

    for stem in ["0_NOISY", "0_ORIGINAL", "0_SUPER_CLEANED"] {
        assert!(dir.path().join("plots").join(format!("{stem}_psd.png")).exists());
        assert!(dir
            .path()
            .join("plots")
            .join(format!("{stem}_spectrogram.png"))
            .exists());
    }
}

#[test]
fn stereo_input_is_averaged_to_mono() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stereo.wav");
    let left = vec![0.5; 100];
    let right = vec![-0.25; 100];
    write_wav(&path, &[left, right], FS);

    let waveform = AudioProcessor::new().load_waveform(&path).unwrap();
    assert_eq!(waveform.len(), 100);
    assert!(waveform.samples.iter().all(|s| (s - 0.125).abs() < 1e-3));
}

#[test]
fn mismatched_rates_fail_fast() {
    let dir = tempfile::tempdir().unwrap();
    let original_path = dir.path().join("a.wav");
    let noisy_path = dir.path().join("b.wav");
    let output_path = dir.path().join("c.wav");
    write_wav(&original_path, &[vec![0.1; 4000]], 16000);
    write_wav(&noisy_path, &[vec![0.1; 4000]], 8000);

    let plots_dir = dir.path().join("plots");
    let plots = DiagnosticsWriter::new(&plots_dir, 1024).unwrap();

    let err = Denoiser::new(DenoiseConfig::default())
        .unwrap()
        .process_file(&original_path, &noisy_path, &output_path, Some(&plots))
        .unwrap_err();

    assert!(err.to_string().contains("Sample rate mismatch"));
    assert!(!output_path.exists());
    // Rejected before any plot is drawn.
    assert!(!plots_dir.exists());
}

#[tokio::test]
async fn batch_continues_past_a_failed_pair() {
    let dir = tempfile::tempdir().unwrap();
    let (clean, noisy) = speech_like_pair(16000);
    write_wav(&dir.path().join("1_ORIGINAL.wav"), &[clean], FS);
    write_wav(&dir.path().join("1_NOISY.wav"), &[noisy], FS);

    let jobs = vec![
        BatchJob {
            original: dir.path().join("missing_ORIGINAL.wav"),
            noisy: dir.path().join("1_NOISY.wav"),
            output: dir.path().join("out").join("missing.wav"),
        },
        BatchJob {
            original: dir.path().join("1_ORIGINAL.wav"),
            noisy: dir.path().join("1_NOISY.wav"),
            output: dir.path().join("out").join("1_CLEANED.wav"),
        },
    ];

    let denoiser = Arc::new(Denoiser::new(DenoiseConfig::default()).unwrap());
    let report = run_batch(denoiser, jobs, 2, None).await;

    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 1);
    assert!(report.entries[0].category().is_none());
    assert!(report.entries[1].category().is_some());
    assert!(dir.path().join("out").join("1_CLEANED.wav").exists());
}
