//! Shared utilities for consuldiff.
//!
//! - Logging setup with tracing
//! - RAII-based timing for poll cycles and collaborator calls

pub mod log;
pub mod timing;

pub use log::{LogConfig, LogLevel};
pub use timing::TimingGuard;
