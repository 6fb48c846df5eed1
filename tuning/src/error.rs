//! Tuning error types
//!
//! One taxonomy for every failure the tuner can surface. Execution failures of
//! the candidate binary are NOT errors here: they become the failure sentinel
//! score inside the pipeline. What remains is what a run cannot recover from
//! for a given benchmark, plus the interrupt that aborts the whole run.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for tuning operations
pub type TuneResult<T> = Result<T, TuneError>;

/// Errors that can occur while tuning a benchmark
#[derive(Error, Debug)]
pub enum TuneError {
    /// Reading or writing a file failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A result file contained a token that is not a floating-point literal
    #[error("Non-numeric token {token:?} in {path}")]
    Parse { path: PathBuf, token: String },

    /// The shell could not be spawned for a command
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The user interrupted a running command; the whole run must stop
    #[error("Interrupted while running `{command}`")]
    Interrupted { command: String },

    /// The floating-point reference binary exited with a failure status
    #[error("Reference run of {benchmark} failed with status {status}")]
    ReferenceFailed { benchmark: String, status: i32 },

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Benchmark name cannot be safely placed in a shell command
    #[error("Benchmark name {0:?} cannot be quoted for the shell")]
    UnsafeName(String),

    /// Instruction statistics file is malformed
    #[error("Malformed instruction statistics in {path}: {message}")]
    StatFile { path: PathBuf, message: String },

    /// Rendering an error curve failed
    #[error("Plot rendering failed: {0}")]
    Plot(String),

    /// The search engine attempted a phase change its state graph forbids
    #[error(transparent)]
    Phase(#[from] crate::search::IllegalTransition),
}

impl TuneError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is the global abort signal
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }
}
