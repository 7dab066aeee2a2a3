//! Flowwave, a per-core traffic analyzer producing live anomaly verdicts per source flow.
//!
//! Modular structure:
//! - [`intake`]: Shared metadata queues and the fetcher draining them
//! - [`flow`]: Per-source flow aggregation
//! - [`features`]: Packet encoding and short-time spectral features
//! - [`trainer`]: Rendezvous with the external clustering trainer
//! - [`mode`]: TRAIN / EXECUTE state machine
//! - [`classify`]: Distance to learned cluster centers
//! - [`record`]: Bounded result buffer and JSON export
//! - [`worker`]: Polling loop and lifecycle
//! - [`logging`]: Structured logging setup

pub mod config;
pub mod error;
pub mod intake;
pub mod flow;
pub mod features;
pub mod trainer;
pub mod mode;
pub mod classify;
pub mod record;
pub mod worker;
pub mod logging;

pub use config::AnalyzerConfig;
pub use error::{ConfigError, PersistError, StartupError};
pub use intake::{MetadataSource, PacketMetadata, SharedMetadataQueue};
pub use flow::{FlowTable, FlowWindow};
pub use features::{FeatureFrames, SpectralExtractor};
pub use trainer::{TrainerLink, TrainerStatus};
pub use mode::{Mode, ModeController};
pub use classify::DistanceClassifier;
pub use record::{FlowRecord, ResultRecorder};
pub use worker::{AnalyzerWorker, RunSummary, StopHandle};
pub use logging::StructuredLogger;
