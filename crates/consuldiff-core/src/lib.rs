//! Core of consuldiff: configuration, change reporting and the poll cycle.
//!
//! Each cycle fetches the KV state under a prefix, diffs it against the last
//! persisted snapshot, reports the changes, writes the new snapshot (raw and
//! base64 encodings) and optionally publishes the files to git.

pub mod config;
pub mod controller;
pub mod error;
pub mod reporter;

pub use config::Config;
pub use controller::{Baseline, CycleController, CycleKind, CycleReport, CycleState, PublishStatus};
pub use error::{ConfigError, CycleError};
pub use reporter::{ChangeReporter, LogReporter, RecordingReporter};
