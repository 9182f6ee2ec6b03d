//! Structured observability hooks for the notifier.
//!
//! This module provides:
//! - Connection-scoped tracing spans via [`session_span`]
//! - Emission functions for key events: edges, report scheduling and
//!   delivery, reconnect scheduling, command dispatch
//!
//! Events are emitted at `info!` level unless noted. Filter with `RUST_LOG`.

use std::time::Duration;

use tracing::{info, info_span, warn, Span};

use crate::detector::Direction;

/// Span tagged with the chat identity and connection id. The bot
/// instruments all work done on behalf of one connection with it.
pub fn session_span(nickname: &str, connection: u64) -> Span {
    info_span!("herald.session", nickname = %nickname, connection = connection)
}

/// Emit event: a builder flipped between success and failure.
pub fn emit_edge_detected(builder: &str, direction: Direction, revision: Option<&str>) {
    info!(
        event = "edge.detected",
        builder = %builder,
        direction = ?direction,
        revision = revision.unwrap_or("unknown"),
    );
}

/// Emit event: an edge was folded into the pending report.
pub fn emit_report_scheduled(builder: &str, direction: Direction, window: Duration) {
    info!(
        event = "report.scheduled",
        builder = %builder,
        direction = ?direction,
        window_secs = window.as_secs_f64(),
        "delaying status report"
    );
}

/// Emit event: every builder is idle, so the pending report goes out now.
pub fn emit_report_flushed_early(pending_builders: usize) {
    info!(
        event = "report.flushed_early",
        pending_builders = pending_builders,
        "all builders are idle, reporting now"
    );
}

/// Emit event: a report was handed to the chat session.
pub fn emit_report_sent(succeeded: usize, failed: usize, revision: Option<&str>) {
    info!(
        event = "report.sent",
        succeeded = succeeded,
        failed = failed,
        revision = revision.unwrap_or("unknown"),
    );
}

/// Emit event: a report fired while no session was up (warn level).
pub fn emit_report_dropped(message: &str) {
    warn!(event = "report.dropped", message = %message, "not connected, status report dropped");
}

/// Emit event: a reconnect attempt was scheduled.
pub fn emit_reconnect_scheduled(outcome: &str, delay: Duration, reason: &str) {
    info!(
        event = "connection.retry_scheduled",
        outcome = %outcome,
        delay_secs = delay.as_secs_f64(),
        reason = %reason,
    );
}

/// Emit event: a chat command is about to run.
pub fn emit_command_dispatched(command: &str, user: &str) {
    info!(event = "command.dispatched", command = %command, user = %user);
}

/// Emit event: a chat command handler failed (warn level).
pub fn emit_command_failed(command: &str, error: &dyn std::fmt::Display) {
    warn!(event = "command.failed", command = %command, error = %error);
}
