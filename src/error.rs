use std::path::PathBuf;
use thiserror::Error;

/// Discovery failures. All of them are fatal for a run.
#[derive(Debug, Error)]
pub enum DiscoverError {
    #[error("Invalid root directory {}: {reason}", path.display())]
    InvalidRoot { path: PathBuf, reason: &'static str },
}

/// A single file could not be decoded into samples.
#[derive(Debug, Error)]
#[error("Failed to decode {}: {reason}", path.display())]
pub struct DecodeError {
    pub path: PathBuf,
    pub reason: String,
}

impl DecodeError {
    pub fn new(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    #[error("signal has no samples")]
    EmptySignal,
    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(u32),
}

/// Per-file extraction failure. Recoverable: the run records it and moves on.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Analysis of {} failed: {source}", path.display())]
    Analysis {
        path: PathBuf,
        #[source]
        source: AnalysisError,
    },

    #[error("Non-finite value for {field} in {}", path.display())]
    NonFinite { path: PathBuf, field: String },

    #[error("Extraction of {} panicked: {message}", path.display())]
    Panicked { path: PathBuf, message: String },
}

impl ExtractError {
    /// Reason without the path, for per-file failure listings.
    pub fn reason(&self) -> String {
        match self {
            ExtractError::Decode(e) => e.reason.clone(),
            ExtractError::Analysis { source, .. } => source.to_string(),
            ExtractError::NonFinite { field, .. } => format!("non-finite value for {field}"),
            ExtractError::Panicked { message, .. } => format!("panicked: {message}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("Cannot write output table {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Record for {filename} is missing declared field {field}")]
    SchemaMismatch { filename: String, field: String },

    #[error("Record written before the header row")]
    HeaderNotWritten,
}

/// Run-level errors. Any of these halts processing.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Discover(#[from] DiscoverError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error("Filename {filename} is shared by {} files", paths.len())]
    FilenameCollision { filename: String, paths: Vec<PathBuf> },

    #[error("Run cancelled after {written} rows")]
    Cancelled { written: usize },

    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
