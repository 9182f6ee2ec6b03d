//! Build-event side of the bot: edge detection, debouncing and idle flushes.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::aggregator::{DebounceAggregator, ReportSnapshot};
use crate::detector::detect;
use crate::domain::{BuildEvent, BuildResult};
use crate::obs;
use crate::registry::{all_idle, failing_builders, BuilderRegistry, CategoryFilter};
use crate::timer::{ReschedulableTimer, TimerToken};

/// A fired report together with the live failure list taken at fire time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueReport {
    pub snapshot: ReportSnapshot,
    pub current_failures: Vec<String>,
}

/// A feed event plus the builder's previous result, captured when the
/// event was published.
///
/// The bot processes events asynchronously; by then the registry may have
/// recorded newer builds, so the baseline has to be taken up front.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEvent {
    pub event: BuildEvent,
    pub previous_result: Option<BuildResult>,
    /// The builder's category: the event's own, else the registered one.
    pub category: Option<String>,
}

impl FeedEvent {
    /// `registry` must already reflect `event`.
    pub fn capture(event: &BuildEvent, registry: &dyn BuilderRegistry) -> Self {
        let (previous_result, category) = match event {
            BuildEvent::BuildFinished {
                builder, category, ..
            } => (
                registry.last_two_results(builder).0,
                category.clone().or_else(|| registry.category(builder)),
            ),
            _ => (None, None),
        };
        Self {
            event: event.clone(),
            previous_result,
            category,
        }
    }
}

pub struct StatusTracker<E> {
    registry: Arc<dyn BuilderRegistry>,
    filter: CategoryFilter,
    aggregator: DebounceAggregator<E>,
}

impl<E: Send + 'static> StatusTracker<E> {
    pub fn new(
        registry: Arc<dyn BuilderRegistry>,
        filter: CategoryFilter,
        window: Duration,
        timer: ReschedulableTimer<E>,
    ) -> Self {
        Self {
            registry,
            filter,
            aggregator: DebounceAggregator::new(window, timer),
        }
    }

    pub fn aggregator(&self) -> &DebounceAggregator<E> {
        &self.aggregator
    }

    /// React to one feed event.
    pub fn on_feed_event(&mut self, feed_event: &FeedEvent) {
        match &feed_event.event {
            BuildEvent::BuildFinished {
                builder,
                result,
                revision,
                ..
            } => {
                let category = feed_event.category.as_deref();
                debug!(builder = %builder, category = ?category, result = %result, "build finished");
                if !self.filter.matches(category) {
                    return;
                }
                let previous = feed_event.previous_result;
                if let Some(edge) = detect(builder, previous, *result, revision.clone()) {
                    obs::emit_edge_detected(&edge.builder, edge.direction, edge.revision.as_deref());
                    self.aggregator.on_edge(edge);
                }
            }
            BuildEvent::BuilderStateChanged { builder, state } => {
                debug!(builder = %builder, state = ?state, "builder changed state");
                if self.aggregator.is_pending() && all_idle(self.registry.as_ref(), &self.filter) {
                    self.aggregator.on_idle_all_builders();
                }
            }
            BuildEvent::BuildStarted { builder, category } => {
                debug!(builder = %builder, category = ?category, "build started");
            }
            BuildEvent::BuilderAdded { builder, category } => {
                info!(builder = %builder, category = ?category, "builder added");
            }
            BuildEvent::BuilderRemoved { builder } => {
                info!(builder = %builder, "builder removed");
            }
        }
    }

    /// Handle a settle-timer token; returns the report if one is due.
    pub fn on_timer(&mut self, token: TimerToken) -> Option<DueReport> {
        let snapshot = self.aggregator.on_timer(token)?;
        let current_failures = failing_builders(self.registry.as_ref(), &self.filter);
        Some(DueReport {
            snapshot,
            current_failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BuildResult, BuilderState};
    use crate::registry::MemoryRegistry;
    use tokio::sync::mpsc;

    struct Harness {
        registry: Arc<MemoryRegistry>,
        tracker: StatusTracker<TimerToken>,
        rx: mpsc::UnboundedReceiver<TimerToken>,
    }

    impl Harness {
        fn new(filter: CategoryFilter) -> Self {
            let registry = Arc::new(MemoryRegistry::new());
            let (tx, rx) = mpsc::unbounded_channel();
            let tracker = StatusTracker::new(
                registry.clone(),
                filter,
                Duration::from_secs(60),
                ReschedulableTimer::new(tx, |t| t),
            );
            Self {
                registry,
                tracker,
                rx,
            }
        }

        fn feed(&mut self, event: BuildEvent) {
            self.registry.apply(&event);
            let captured = FeedEvent::capture(&event, self.registry.as_ref());
            self.tracker.on_feed_event(&captured);
        }

        fn finish(&mut self, builder: &str, category: Option<&str>, result: BuildResult) {
            self.feed(BuildEvent::finished(builder, category, result, Some("100")));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_flip_is_reported_with_live_failures() {
        let mut h = Harness::new(CategoryFilter::All);
        h.finish("win32", None, BuildResult::Success);
        h.finish("linux", None, BuildResult::Failure);
        assert!(!h.tracker.aggregator().is_pending(), "no baseline yet");

        h.finish("win32", None, BuildResult::Failure);
        assert!(h.tracker.aggregator().is_pending());

        let token = h.rx.recv().await.unwrap();
        let due = h.tracker.on_timer(token).unwrap();
        assert_eq!(due.snapshot.failed, vec!["win32"]);
        assert_eq!(due.current_failures, vec!["linux", "win32"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_result_is_not_an_edge() {
        let mut h = Harness::new(CategoryFilter::All);
        h.finish("win32", None, BuildResult::Failure);
        h.finish("win32", None, BuildResult::Failure);
        h.finish("win32", None, BuildResult::Warnings);
        assert!(!h.tracker.aggregator().is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_builders_outside_filter_are_ignored() {
        let mut h = Harness::new(CategoryFilter::only(["ports"]));
        h.finish("docs", Some("tools"), BuildResult::Success);
        h.finish("docs", Some("tools"), BuildResult::Failure);
        assert!(!h.tracker.aggregator().is_pending());

        h.finish("dc", Some("ports"), BuildResult::Success);
        h.finish("dc", Some("ports"), BuildResult::Failure);
        assert!(h.tracker.aggregator().is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_filter_uses_registered_category() {
        let mut h = Harness::new(CategoryFilter::only(["ports"]));
        h.feed(BuildEvent::BuilderAdded {
            builder: "dc".to_string(),
            category: Some("ports".to_string()),
        });
        h.finish("dc", None, BuildResult::Success);
        h.finish("dc", None, BuildResult::Failure);
        assert!(h.tracker.aggregator().is_pending());

        let token = h.rx.recv().await.unwrap();
        let due = h.tracker.on_timer(token).unwrap();
        assert_eq!(due.snapshot.failed, vec!["dc"]);
        assert_eq!(due.current_failures, vec!["dc"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_idle_flushes_pending_report() {
        let mut h = Harness::new(CategoryFilter::All);
        let start = tokio::time::Instant::now();
        h.feed(BuildEvent::state_changed("win32", BuilderState::Building));
        h.feed(BuildEvent::state_changed("linux", BuilderState::Building));
        h.finish("win32", None, BuildResult::Success);
        h.finish("win32", None, BuildResult::Failure);

        // One builder still busy: keep waiting.
        h.feed(BuildEvent::state_changed("win32", BuilderState::Idle));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(h.rx.try_recv().is_err());

        h.feed(BuildEvent::state_changed("linux", BuilderState::Idle));
        let token = h.rx.recv().await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(h.tracker.on_timer(token).is_some());
    }

    #[test]
    fn test_capture_takes_baseline_at_publish_time() {
        let registry = MemoryRegistry::new();
        let first = BuildEvent::finished("win32", None, BuildResult::Success, None);
        let second = BuildEvent::finished("win32", None, BuildResult::Failure, None);
        registry.apply(&first);
        registry.apply(&second);
        let captured = FeedEvent::capture(&second, &registry);

        // A later build must not change what was captured.
        registry.apply(&BuildEvent::finished("win32", None, BuildResult::Success, None));
        assert_eq!(captured.previous_result, Some(BuildResult::Success));
        assert_eq!(
            FeedEvent::capture(&BuildEvent::state_changed("win32", BuilderState::Idle), &registry)
                .previous_result,
            None
        );
    }
}
