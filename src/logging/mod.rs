//! Structured logging for analyzer hosts.

mod format;

pub use format::StructuredLogger;
