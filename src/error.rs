use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures while producing or loading a dataset.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("unknown dataset size class: {0} (expected small|large)")]
    UnknownSizeClass(String),

    #[error("invalid dataset file {path}: {reason}")]
    InvalidFile { path: PathBuf, reason: String },

    #[error("dataset encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Failures raised while timing a suite.
#[derive(Error, Debug)]
pub enum BenchError {
    #[error("invalid iteration count {count} for case {case}")]
    InvalidIterations { case: String, count: f64 },

    #[error("negative sample {sample_ms}ms recorded for case {case}")]
    NegativeSample { case: String, sample_ms: f64 },

    #[error("case {case} declared more than once by provider {provider}")]
    DuplicateCase { provider: String, case: String },

    #[error("provider {provider} declares case {case} but has no operation for it")]
    UnknownCase { provider: String, case: String },

    #[error("case {case} of provider {provider} reports {bars} bars more than once")]
    BarCountConflict {
        provider: String,
        case: String,
        bars: usize,
    },

    #[error("progress bar template error: {0}")]
    ProgressTemplate(#[from] indicatif::style::TemplateError),
}

/// Failures reading or writing persisted reports.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("malformed report {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid entry {case} in report {path}: {reason}")]
    InvalidEntry {
        path: PathBuf,
        case: String,
        reason: String,
    },

    #[error("report encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("failed to walk report directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Failures rendering a report bucket.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("baseline provider {baseline} has no results for {bars} bars")]
    MissingBaseline { baseline: String, bars: usize },

    #[error("failed to write chart: {0}")]
    Io(#[from] io::Error),

    #[error("failed to format chart: {0}")]
    Format(#[from] std::fmt::Error),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Bench(#[from] BenchError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
