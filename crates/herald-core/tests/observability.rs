//! Observability tests for the notifier.
//!
//! These verify that the structured events operators grep for are emitted
//! with the expected fields.

use std::sync::Arc;
use std::time::Duration;

use herald_core::detector::Direction;
use herald_core::obs::{
    emit_command_dispatched, emit_command_failed, emit_edge_detected, emit_reconnect_scheduled,
    emit_report_dropped, emit_report_flushed_early, emit_report_scheduled, emit_report_sent,
    session_span,
};
use herald_core::{
    BuildEvent, BuildResult, FeedEvent, MemoryRegistry, ReschedulableTimer, StatusTracker,
    TimerToken,
};
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_emit_report_scheduled_logs_builder_and_direction() {
    emit_report_scheduled("win32", Direction::ToFailure, Duration::from_secs(60));

    assert!(logs_contain("report.scheduled"));
    assert!(logs_contain("builder=win32"));
    assert!(logs_contain("ToFailure"));
}

#[traced_test]
#[test]
fn test_emit_edge_detected_logs_revision() {
    emit_edge_detected("linux", Direction::ToSuccess, Some("4711"));
    assert!(logs_contain("edge.detected"));
    assert!(logs_contain("4711"));
}

#[traced_test]
#[test]
fn test_emit_report_flushed_early() {
    emit_report_flushed_early(3);
    assert!(logs_contain("report.flushed_early"));
    assert!(logs_contain("pending_builders=3"));
}

#[traced_test]
#[test]
fn test_emit_report_sent_without_revision() {
    emit_report_sent(1, 2, None);
    assert!(logs_contain("report.sent"));
    assert!(logs_contain("unknown"));
}

#[traced_test]
#[test]
fn test_emit_report_dropped_logs_warning() {
    emit_report_dropped("Build status changed with r1: Failure: linux");
    assert!(logs_contain("WARN"));
    assert!(logs_contain("report.dropped"));
}

#[traced_test]
#[test]
fn test_emit_reconnect_scheduled() {
    emit_reconnect_scheduled("failed", Duration::from_secs(60), "connection refused");
    assert!(logs_contain("connection.retry_scheduled"));
    assert!(logs_contain("outcome=failed"));
}

#[traced_test]
#[test]
fn test_emit_command_events() {
    emit_command_dispatched("STATUS", "alice");
    emit_command_failed("STATUS", &"registry unavailable");
    assert!(logs_contain("command.dispatched"));
    assert!(logs_contain("command.failed"));
}

#[traced_test]
#[test]
fn test_session_span_tags_events() {
    session_span("buildbot", 7).in_scope(|| tracing::info!("inside session"));

    assert!(logs_contain("herald.session"));
    assert!(logs_contain("connection=7"));
}

/// A real edge flowing through the tracker is logged once.
#[traced_test]
#[tokio::test(start_paused = true)]
async fn test_tracker_logs_scheduled_report() {
    let registry = Arc::new(MemoryRegistry::new());
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel::<TimerToken>();
    let mut tracker = StatusTracker::new(
        registry.clone(),
        Default::default(),
        Duration::from_secs(60),
        ReschedulableTimer::new(tx, |t| t),
    );

    for result in [BuildResult::Success, BuildResult::Failure] {
        let event = BuildEvent::finished("linux", None, result, Some("42"));
        registry.apply(&event);
        tracker.on_feed_event(&FeedEvent::capture(&event, registry.as_ref()));
    }

    assert!(logs_contain("edge.detected"));
    assert!(logs_contain("report.scheduled"));
    assert!(logs_contain("builder=linux"));
}
