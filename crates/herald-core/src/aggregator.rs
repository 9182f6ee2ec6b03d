//! Trailing-debounce aggregation of build status edges.
//!
//! Every accepted edge restarts the settle window. When the window elapses
//! without further edges the pending sets are taken as one
//! [`ReportSnapshot`]. Once all builders are idle the window is cut short.

use std::collections::BTreeSet;
use std::time::Duration;

use tracing::debug;

use crate::detector::{Direction, Edge};
use crate::obs;
use crate::timer::{ReschedulableTimer, TimerToken};

/// Default settle window.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Edges collected since the last report.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PendingReport {
    pub succeeded: BTreeSet<String>,
    pub failed: BTreeSet<String>,
    pub revision: Option<String>,
}

impl PendingReport {
    pub fn is_empty(&self) -> bool {
        self.succeeded.is_empty() && self.failed.is_empty()
    }

    fn apply(&mut self, edge: Edge) {
        let (target, other) = match edge.direction {
            Direction::ToSuccess => (&mut self.succeeded, &mut self.failed),
            Direction::ToFailure => (&mut self.failed, &mut self.succeeded),
        };
        other.remove(&edge.builder);
        target.insert(edge.builder);
        if edge.revision.is_some() {
            self.revision = edge.revision;
        }
    }
}

/// A fired report: sorted builder names plus the last revision seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSnapshot {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
    pub revision: Option<String>,
}

impl From<PendingReport> for ReportSnapshot {
    fn from(pending: PendingReport) -> Self {
        Self {
            succeeded: pending.succeeded.into_iter().collect(),
            failed: pending.failed.into_iter().collect(),
            revision: pending.revision,
        }
    }
}

/// Owns the pending report and its settle timer.
///
/// Invariant: the timer is armed iff the pending report is non-empty.
#[derive(Debug)]
pub struct DebounceAggregator<E> {
    window: Duration,
    pending: PendingReport,
    timer: ReschedulableTimer<E>,
}

impl<E: Send + 'static> DebounceAggregator<E> {
    pub fn new(window: Duration, timer: ReschedulableTimer<E>) -> Self {
        Self {
            window,
            pending: PendingReport::default(),
            timer,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn pending(&self) -> &PendingReport {
        &self.pending
    }

    pub fn is_pending(&self) -> bool {
        self.timer.is_armed()
    }

    /// Fold an edge into the pending report and restart the window.
    pub fn on_edge(&mut self, edge: Edge) {
        if self.timer.is_armed() {
            debug!("cancelling previous status report timer");
        }
        obs::emit_report_scheduled(&edge.builder, edge.direction, self.window);
        self.pending.apply(edge);
        self.timer.arm(self.window);
    }

    /// All builders went idle: report now instead of waiting out the window.
    ///
    /// The flush goes through the timer, so edges arriving before it runs
    /// still land in the same report.
    pub fn on_idle_all_builders(&mut self) -> bool {
        if !self.timer.is_armed() {
            return false;
        }
        obs::emit_report_flushed_early(self.pending.succeeded.len() + self.pending.failed.len());
        self.timer.arm(Duration::ZERO);
        true
    }

    /// Handle a token posted by the settle timer.
    pub fn on_timer(&mut self, token: TimerToken) -> Option<ReportSnapshot> {
        if !self.timer.accept(token) {
            debug!(generation = token.generation(), "ignoring stale report timer");
            return None;
        }
        self.fire()
    }

    /// Take the pending report and disarm the timer.
    ///
    /// Returns `None` when nothing was pending.
    pub fn fire(&mut self) -> Option<ReportSnapshot> {
        self.timer.cancel();
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() {
            return None;
        }
        Some(pending.into())
    }
}
