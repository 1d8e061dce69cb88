//! Error types shared across the pipeline.
//!
//! ```text
//! PreconditionError  malformed dataset or misuse; never retried
//! LoadError          discovery and NPZ decoding
//! ```
//!
//! The model and trainer seams report through `anyhow`, as tract does.

use std::path::PathBuf;
use thiserror::Error;

/// A violated input invariant. The dataset is assumed trusted, so any of
/// these aborts the run.
#[derive(Debug, Error)]
pub enum PreconditionError {
    #[error("raw/stage length mismatch: {raw} raw entries vs {stage} stage labels")]
    LengthMismatch { raw: usize, stage: usize },

    #[error("recording `{key}` has {len} entries, window of {window_size} needs more")]
    WindowTooLarge {
        key: String,
        len: usize,
        window_size: usize,
    },

    #[error("array of rank {0} cannot be prepared for the model (max rank 4)")]
    RankTooHigh(usize),

    #[error("raw array must have at least one axis")]
    ScalarRaw,

    #[error("invalid stage code {0}")]
    InvalidStage(i64),

    #[error("stage label {0} is not a whole number")]
    FractionalStage(f64),

    #[error("clip bounds ({lo}, {hi}) are not ordered")]
    InvalidClamp { lo: f32, hi: f32 },

    #[error("no recordings to draw windows from")]
    EmptyRecordingSet,
}

/// Failure to discover or decode recording files.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid file pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("cannot list `{0}`")]
    Glob(#[from] glob::GlobError),

    #[error("cannot decode `{path}`: {source}")]
    Npz {
        path: PathBuf,
        #[source]
        source: ndarray_npy::ReadNpzError,
    },

    #[error("`{path}` has no array named `{name}`")]
    MissingArray { path: PathBuf, name: String },

    #[error("`{path}`: array `{name}` has an unsupported dtype")]
    UnsupportedDtype { path: PathBuf, name: String },

    #[error("`{path}`: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: PreconditionError,
    },
}
