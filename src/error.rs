//! Error types for configuration, startup and result persistence.

use thiserror::Error;

/// Configuration loading and validation failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config read error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid verbose interval: {0} (must be >= 0)")]
    NegativeInterval(f64),

    #[error("invalid verbose IP target: {0:?}")]
    InvalidIpTarget(String),

    #[error("invalid n_fft: {0} (must be >= 2)")]
    InvalidFftSize(usize),

    #[error("{0} must be non-zero")]
    ZeroParameter(&'static str),

    #[error("{name} = {value} exceeds {max}")]
    OutOfRange {
        name: &'static str,
        value: usize,
        max: usize,
    },

    #[error("analyzer already configured")]
    AlreadyConfigured,

    /// A memory-sizing parameter above its hard cap. The host must terminate.
    #[error("{name} = {value} exceeds hard cap {max}")]
    CriticalLimit {
        name: &'static str,
        value: usize,
        max: usize,
    },
}

impl ConfigError {
    /// True when the error must terminate the process rather than just abort configuration.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConfigError::CriticalLimit { .. })
    }
}

/// Preconditions checked by [`crate::AnalyzerWorker::start`].
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("no analyzer configuration found")]
    MissingConfig,

    #[error("no trainer bound")]
    MissingTrainer,

    #[error("no upstream metadata source registered")]
    NoSources,

    #[error("trainer expects {got} features per center, transform yields {expected}")]
    FeatureDim { expected: usize, got: usize },

    #[error("{buffer} buffer: bad allocation of {size} entries")]
    Allocation { buffer: &'static str, size: usize },

    #[error("analyzer already running")]
    AlreadyRunning,

    /// The mode switches once per worker, so a finished worker stays finished.
    #[error("analyzer already finished a run")]
    AlreadyFinished,
}

/// Failures writing the result document.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("result file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("result encode error: {0}")]
    Json(#[from] serde_json::Error),
}
