use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use spectral_mask_denoiser::{
    run_batch, BatchManifest, DenoiseConfig, Denoiser, DiagnosticsWriter,
};

#[derive(Parser, Debug)]
#[command(
    name = "spectral_mask_denoiser",
    about = "Reference-guided spectral masking denoiser for paired recordings"
)]
struct Cli {
    /// JSON file overriding thresholds and mask parameters
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Denoise one noisy recording against its clean reference
    Denoise {
        #[arg(long)]
        original: PathBuf,
        #[arg(long)]
        noisy: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Directory for PSD and spectrogram plots
        #[arg(long)]
        plots: Option<PathBuf>,
    },
    /// Print the features and noise category of a recording
    Classify {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Denoise every (original, noisy, output) triple of a JSON manifest
    Batch {
        #[arg(long)]
        manifest: PathBuf,
        #[arg(long, default_value_t = 4)]
        jobs: usize,
        #[arg(long)]
        plots: Option<PathBuf>,
        /// Write the per-file report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Print the effective configuration as JSON
    DumpConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Denoise {
            original,
            noisy,
            output,
            plots,
        } => {
            let denoiser = Denoiser::new(config)?;
            let diagnostics = diagnostics_writer(plots, &denoiser)?;
            let report = denoiser
                .process_file(&original, &noisy, &output, diagnostics.as_ref())
                .with_context(|| format!("denoising {}", noisy.display()))?;
            println!("{}: {}", report.output.display(), report.category);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Classify { input, json } => {
            let denoiser = Denoiser::new(config)?;
            let classification = denoiser
                .classify_file(&input)
                .with_context(|| format!("classifying {}", input.display()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&classification)?);
            } else {
                let f = &classification.features;
                println!("energy:             {:.6}", f.energy);
                println!("dominant frequency: {:.1} Hz", f.dominant_frequency);
                println!("spectral centroid:  {:.1} Hz", f.spectral_centroid);
                println!("frame energy std:   {:.6}", f.std_energy);
                println!("spikes:             {}", f.spike_count);
                println!("category:           {}", classification.category);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Batch {
            manifest,
            jobs,
            plots,
            report,
        } => {
            let manifest = BatchManifest::from_json_file(&manifest)
                .with_context(|| format!("reading manifest {}", manifest.display()))?;
            let denoiser = Denoiser::new(config)?;
            let diagnostics = diagnostics_writer(plots, &denoiser)?.map(Arc::new);
            info!("Running {} file pairs", manifest.jobs.len());

            let batch = run_batch(Arc::new(denoiser), manifest.jobs, jobs, diagnostics).await;

            for entry in &batch.entries {
                match entry.category() {
                    Some(category) => println!("{}: {}", entry.job.output.display(), category),
                    None => println!("{}: FAILED", entry.job.output.display()),
                }
            }
            if let Some(path) = report {
                std::fs::write(&path, batch.to_json_pretty()?)
                    .with_context(|| format!("writing report {}", path.display()))?;
            }

            println!("{} succeeded, {} failed", batch.succeeded(), batch.failed());
            Ok(if batch.failed() == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            })
        }
        Commands::DumpConfig => {
            println!("{}", config.to_json_pretty()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<DenoiseConfig> {
    match path {
        Some(path) => DenoiseConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(DenoiseConfig::default()),
    }
}

fn diagnostics_writer(
    plots: Option<PathBuf>,
    denoiser: &Denoiser,
) -> Result<Option<DiagnosticsWriter>> {
    plots
        .map(|dir| DiagnosticsWriter::new(dir, denoiser.config().frame_size))
        .transpose()
        .map_err(Into::into)
}
