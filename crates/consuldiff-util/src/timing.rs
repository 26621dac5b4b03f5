//! Duration logging for cycles and collaborator calls.
//!
//! # Example
//!
//! ```rust,ignore
//! use consuldiff_util::timing::TimingGuard;
//!
//! async fn poll_once(interval: Duration) {
//!     let _timing = TimingGuard::cycle("steady").warn_after(interval);
//!     // fetch, diff, persist, publish
//! }
//! ```

use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const CYCLE_INFO_AFTER: Duration = Duration::from_secs(1);
const COLLABORATOR_INFO_AFTER: Duration = Duration::from_millis(500);
const DEFAULT_WARN_AFTER: Duration = Duration::from_secs(30);

/// Logs how long its scope took when dropped.
///
/// Below `info_after` the event is debug, from `warn_after` on it is a
/// warning.
pub struct TimingGuard {
    kind: &'static str,
    name: String,
    start: Instant,
    info_after: Duration,
    warn_after: Duration,
}

impl TimingGuard {
    fn start(kind: &'static str, name: String, info_after: Duration) -> Self {
        debug!(kind, name = %name, "Started");
        Self {
            kind,
            name,
            start: Instant::now(),
            info_after,
            warn_after: DEFAULT_WARN_AFTER,
        }
    }

    /// Time one poll cycle.
    pub fn cycle(kind: impl Into<String>) -> Self {
        Self::start("cycle", kind.into(), CYCLE_INFO_AFTER)
    }

    /// Time one call into Consul or git.
    pub fn collaborator(name: impl Into<String>) -> Self {
        Self::start("collaborator", name.into(), COLLABORATOR_INFO_AFTER)
    }

    /// Warn once the scope has taken at least `limit`.
    pub fn warn_after(mut self, limit: Duration) -> Self {
        self.warn_after = limit;
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Render a duration for humans: `850ms`, `2.31s`, `3m 4.2s`.
pub fn format_duration(duration: Duration) -> String {
    let ms = duration.as_millis();
    match ms {
        0..=999 => format!("{ms}ms"),
        1_000..=59_999 => format!("{:.2}s", ms as f64 / 1000.0),
        _ => format!("{}m {:.1}s", ms / 60_000, (ms % 60_000) as f64 / 1000.0),
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let took = format_duration(elapsed);
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

        if elapsed >= self.warn_after {
            warn!(
                kind = self.kind,
                name = %self.name,
                elapsed_ms,
                limit = %format_duration(self.warn_after),
                "Slow {} took {took}",
                self.kind
            );
        } else if elapsed >= self.info_after {
            info!(kind = self.kind, name = %self.name, elapsed_ms, "Finished in {took}");
        } else {
            debug!(kind = self.kind, name = %self.name, elapsed_ms, "Finished in {took}");
        }
    }
}
