//! The fetch → diff → persist → publish cycle.
//!
//! A [`CycleController`] owns its collaborators and runs one cycle at a time.
//! The first cycle of a fresh deployment is a *bootstrap*: the fetched state
//! is written as the baseline without diffing. Every later cycle diffs the
//! fetched state against the snapshot persisted at the single canonical
//! location, reports the changes and overwrites both snapshot files.
//!
//! Failure policy:
//! - a fetch failure skips the whole cycle (nothing is read, written or
//!   published) and the next attempt happens after the poll interval;
//! - a previous snapshot that is missing, corrupt or unreadable at steady
//!   state is replaced by an empty one (a *degraded* diff), logged distinctly
//!   from a real mass change;
//! - a failed write leaves the cycle incomplete and skips publishing;
//! - a failed publish never undoes the completed writes.

use crate::{ChangeReporter, Config, CycleError};
use consuldiff_consul::KvSource;
use consuldiff_git::{PublishOutcome, Publisher};
use consuldiff_snapshot::{diff, Base64, Change, Raw, Snapshot};
use consuldiff_storage::{SnapshotStore, StoreResult};
use consuldiff_util::timing::format_duration;
use consuldiff_util::TimingGuard;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// What the controller is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleState {
    #[default]
    Idle,
    Fetching,
    Diffing,
    Persisting,
    Publishing,
}

/// Whether a cycle establishes the baseline or compares against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    Bootstrap,
    Steady,
}

impl CycleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleKind::Bootstrap => "bootstrap",
            CycleKind::Steady => "steady",
        }
    }
}

/// What the fetched state was compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Baseline {
    /// The persisted snapshot was read.
    Loaded,
    /// No persisted snapshot at steady state.
    Missing,
    /// The persisted snapshot could not be parsed.
    Corrupt,
    /// The persisted snapshot could not be read.
    Unreadable,
    /// Bootstrap; no comparison was made.
    NotCompared,
}

impl Baseline {
    /// The diff ran against an empty stand-in for the previous snapshot.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Baseline::Missing | Baseline::Corrupt | Baseline::Unreadable)
    }
}

/// Result of the publish step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishStatus {
    /// No publisher configured.
    Disabled,
    /// Not attempted because the snapshot files were not fully written.
    Skipped,
    Published(PublishOutcome),
    Failed(String),
}

/// Everything one completed cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub kind: CycleKind,
    pub baseline: Baseline,
    /// Changes handed to the reporter. Empty on bootstrap.
    pub changes: Vec<Change>,
    /// Both snapshot files were written.
    pub persisted: bool,
    pub publish: PublishStatus,
    /// Number of keys fetched.
    pub keys: usize,
}

impl CycleReport {
    /// The cycle persisted its snapshot and, if enabled, published it.
    pub fn is_complete(&self) -> bool {
        self.persisted && !matches!(self.publish, PublishStatus::Failed(_))
    }
}

/// Which snapshot files a cycle managed to write.
#[derive(Debug, Clone, Copy)]
struct Written {
    raw: bool,
    encoded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Uninitialized,
    NeedsBaseline,
    Steady,
}

/// Runs poll cycles against a set of collaborators.
pub struct CycleController<'a, K, S, P, R> {
    config: &'a Config,
    source: K,
    store: S,
    publisher: Option<P>,
    reporter: R,
    state: CycleState,
    phase: Phase,
    cycles: u64,
}

impl<'a, K, S, P, R> CycleController<'a, K, S, P, R>
where
    K: KvSource,
    S: SnapshotStore,
    P: Publisher,
    R: ChangeReporter,
{
    /// Create a controller. Pass `None` as publisher to keep snapshots local.
    pub fn new(config: &'a Config, source: K, store: S, publisher: Option<P>, reporter: R) -> Self {
        Self {
            config,
            source,
            store,
            publisher,
            reporter,
            state: CycleState::Idle,
            phase: Phase::Uninitialized,
            cycles: 0,
        }
    }

    pub fn config(&self) -> &Config {
        self.config
    }

    pub fn source(&self) -> &K {
        &self.source
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn publisher(&self) -> Option<&P> {
        self.publisher.as_ref()
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Number of cycles started, including skipped ones.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Decide whether the next cycle is a bootstrap.
    ///
    /// Only a store that positively reports no snapshot leads to a bootstrap.
    /// Anything else, including a store that cannot answer, means steady
    /// state; the cycle then surfaces the problem as a degraded diff.
    /// Runs automatically before the first cycle.
    pub async fn initialize(&mut self) -> CycleKind {
        let location = self.config.raw_location();
        self.phase = match self.store.exists(location).await {
            Ok(false) => {
                info!(location, "No persisted snapshot, first cycle establishes the baseline");
                Phase::NeedsBaseline
            }
            Ok(true) => {
                debug!(location, "Found persisted snapshot");
                Phase::Steady
            }
            Err(e) => {
                error!(location, error = %e, "Failed to inspect persisted snapshot, assuming steady state");
                Phase::Steady
            }
        };
        self.next_kind()
    }

    /// Kind of the next cycle.
    pub fn next_kind(&self) -> CycleKind {
        match self.phase {
            Phase::NeedsBaseline => CycleKind::Bootstrap,
            Phase::Uninitialized | Phase::Steady => CycleKind::Steady,
        }
    }

    /// Run one cycle.
    ///
    /// Returns `Err` only when the fetch failed, in which case nothing else
    /// happened. Storage and publish failures are part of the report.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        if self.phase == Phase::Uninitialized {
            self.initialize().await;
        }
        self.cycles += 1;
        let kind = self.next_kind();
        let span = info_span!("cycle", number = self.cycles, kind = kind.as_str());
        let result = self.execute(kind).instrument(span).await;
        self.transition(CycleState::Idle);
        result
    }

    async fn execute(&mut self, kind: CycleKind) -> Result<CycleReport, CycleError> {
        let _timing = TimingGuard::cycle(kind.as_str()).warn_after(self.config.poll_interval);

        self.transition(CycleState::Fetching);
        let fetched = {
            let _timing = TimingGuard::collaborator("consul.fetch");
            self.source.fetch(&self.config.key_prefix).await
        };
        let pairs = match fetched {
            Ok(pairs) => pairs,
            Err(e) => {
                error!(prefix = %self.config.key_prefix, error = %e, "Failed to fetch KV state, skipping cycle");
                return Err(e.into());
            }
        };
        let current: Snapshot<Raw> = Snapshot::from_pairs(&pairs);
        let encoded: Snapshot<Base64> = Snapshot::from_pairs(&pairs);
        info!(keys = current.len(), prefix = %self.config.key_prefix, "Fetched KV state");

        let (baseline, changes) = match kind {
            CycleKind::Bootstrap => {
                info!("Establishing baseline, nothing to compare against");
                (Baseline::NotCompared, Vec::new())
            }
            CycleKind::Steady => {
                self.transition(CycleState::Diffing);
                self.compare(&current).await
            }
        };

        self.transition(CycleState::Persisting);
        let written = self.persist(&current, &encoded).await;
        let persisted = written.raw && written.encoded;
        // The raw file alone is the baseline; publishing needs both files.
        if written.raw && kind == CycleKind::Bootstrap {
            info!(location = self.config.raw_location(), "Baseline established");
            self.phase = Phase::Steady;
        }

        let publish = match (self.publisher.is_some(), persisted) {
            (false, _) => PublishStatus::Disabled,
            (true, false) => {
                warn!("Snapshot files not fully written, skipping publish");
                PublishStatus::Skipped
            }
            (true, true) => {
                self.transition(CycleState::Publishing);
                self.publish().await
            }
        };

        Ok(CycleReport {
            kind,
            baseline,
            changes,
            persisted,
            publish,
            keys: current.len(),
        })
    }

    /// Diff against the persisted snapshot and report the changes.
    async fn compare(&self, current: &Snapshot<Raw>) -> (Baseline, Vec<Change>) {
        let location = self.config.raw_location();
        let read: StoreResult<Option<Snapshot<Raw>>> = self.store.read(location).await;
        let (baseline, previous) = match read {
            Ok(Some(previous)) => (Baseline::Loaded, previous),
            Ok(None) => {
                warn!(location, "Persisted snapshot disappeared, diffing against an empty snapshot");
                (Baseline::Missing, Snapshot::new())
            }
            Err(e) if e.is_corrupt() => {
                error!(location, error = %e, "Persisted snapshot is corrupt, diffing against an empty snapshot");
                (Baseline::Corrupt, Snapshot::new())
            }
            Err(e) => {
                error!(location, error = %e, "Failed to read persisted snapshot, diffing against an empty snapshot");
                (Baseline::Unreadable, Snapshot::new())
            }
        };

        let changes = diff(&previous, current);
        if baseline.is_degraded() {
            warn!(
                baseline = ?baseline,
                changes = changes.len(),
                "Degraded diff: every current key is reported as added"
            );
        }
        self.reporter.report(&changes);
        (baseline, changes)
    }

    /// Write both encodings. Each write is attempted regardless of the other.
    async fn persist(&self, raw: &Snapshot<Raw>, encoded: &Snapshot<Base64>) -> Written {
        let raw_location = self.config.raw_location();
        let encoded_location = self.config.base64_location();

        let raw_ok = match self.store.write(raw_location, raw).await {
            Ok(()) => {
                debug!(location = raw_location, keys = raw.len(), "Wrote snapshot");
                true
            }
            Err(e) => {
                error!(location = raw_location, error = %e, "Failed to write snapshot");
                false
            }
        };
        let encoded_ok = match self.store.write(&encoded_location, encoded).await {
            Ok(()) => {
                debug!(location = %encoded_location, keys = encoded.len(), "Wrote snapshot");
                true
            }
            Err(e) => {
                error!(location = %encoded_location, error = %e, "Failed to write snapshot");
                false
            }
        };

        Written {
            raw: raw_ok,
            encoded: encoded_ok,
        }
    }

    async fn publish(&self) -> PublishStatus {
        let Some(publisher) = &self.publisher else {
            return PublishStatus::Disabled;
        };
        let paths = [
            PathBuf::from(self.config.raw_location()),
            PathBuf::from(self.config.base64_location()),
        ];

        let _timing = TimingGuard::collaborator("git.publish");
        match publisher.publish(&paths).await {
            Ok(outcome) => {
                match &outcome.commit {
                    Some(commit) => info!(commit = %commit, pushed = outcome.pushed, "Published snapshot"),
                    None => info!(pushed = outcome.pushed, "Snapshot unchanged, nothing to commit"),
                }
                PublishStatus::Published(outcome)
            }
            Err(e) => {
                error!(error = %e, "Failed to publish snapshot, persisted files are kept");
                PublishStatus::Failed(e.to_string())
            }
        }
    }

    fn transition(&mut self, next: CycleState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "Cycle state");
            self.state = next;
        }
    }

    /// Run cycles until `shutdown` is cancelled.
    ///
    /// Cancellation is observed only between cycles: a running cycle always
    /// finishes, then the loop stops instead of sleeping.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        let interval = self.config.poll_interval;
        info!(interval = %format_duration(interval), "Starting poll loop");

        while !shutdown.is_cancelled() {
            if self.run_cycle().await.is_err() {
                info!(retry_in = %format_duration(interval), "Cycle skipped");
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!(cycles = self.cycles, "Poll loop stopped");
    }
}
