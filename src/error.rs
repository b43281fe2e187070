//! Error types for the denoising pipeline

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading, denoising or persisting a file pair.
///
/// Numeric edge cases (silence, near-zero magnitudes) are absorbed by
/// epsilon floors and never surface here.
#[derive(Error, Debug)]
pub enum DenoiseError {
    #[error("Failed to load audio file {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("Failed to write audio file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Empty signal during {stage}")]
    EmptySignal { stage: &'static str },

    #[error("Sample rate mismatch: original={original}Hz, noisy={noisy}Hz")]
    SampleRateMismatch { original: u32, noisy: u32 },

    #[error("Shape mismatch during {stage}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        stage: &'static str,
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to write plot {path}: {source}")]
    Plot {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DenoiseError>;

/// `create_dir_all` with the directory named in the error.
pub(crate) fn create_dir_all(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|source| DenoiseError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}
