//! Change reporting.

use consuldiff_snapshot::{Change, ChangeSummary};
use std::sync::{Arc, Mutex};
use tracing::info;

/// A sink for the changes found by one diff.
pub trait ChangeReporter: Send + Sync {
    fn report(&self, changes: &[Change]);
}

/// Writes every change to the log as an audit line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ChangeReporter for LogReporter {
    fn report(&self, changes: &[Change]) {
        for change in changes {
            match change {
                Change::Added { key, value } => {
                    info!(change = change.kind(), key = %key, new = %value, "{change}");
                }
                Change::Modified { key, old, new } => {
                    info!(change = change.kind(), key = %key, old = %old, new = %new, "{change}");
                }
                Change::Deleted { key, value } => {
                    info!(change = change.kind(), key = %key, old = %value, "{change}");
                }
            }
        }

        let summary = ChangeSummary::from_changes(changes);
        if summary.is_empty() {
            info!("No changes detected");
        } else {
            info!(
                added = summary.added,
                modified = summary.modified,
                deleted = summary.deleted,
                "Detected {} change(s)",
                summary.total()
            );
        }
    }
}

/// Keeps every reported batch in memory.
///
/// Clones share the same record, so a test can hand one clone to the
/// controller and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    batches: Arc<Mutex<Vec<Vec<Change>>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every batch reported so far, oldest first.
    pub fn batches(&self) -> Vec<Vec<Change>> {
        self.batches
            .lock()
            .map(|b| b.clone())
            .unwrap_or_default()
    }

    /// Number of `report` calls.
    pub fn report_count(&self) -> usize {
        self.batches.lock().map(|b| b.len()).unwrap_or_default()
    }

    /// The most recent batch.
    pub fn last(&self) -> Option<Vec<Change>> {
        self.batches.lock().ok()?.last().cloned()
    }
}

impl ChangeReporter for RecordingReporter {
    fn report(&self, changes: &[Change]) {
        if let Ok(mut batches) = self.batches.lock() {
            batches.push(changes.to_vec());
        }
    }
}
