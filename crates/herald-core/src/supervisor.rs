//! Reconnect supervision for the chat connection.
//!
//! A connection that was up and then dropped is retried quickly
//! (`lost_delay`); a connection that never came up is retried slowly
//! (`failed_delay`). Once shutdown is requested nothing is retried again.

use std::time::Duration;

use tracing::{debug, info};

use crate::obs;
use crate::timer::{ReschedulableTimer, TimerToken};

/// Retry delays, selected by how the previous attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub lost_delay: Duration,
    pub failed_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            lost_delay: Duration::from_secs(2),
            failed_delay: Duration::from_secs(60),
        }
    }
}

/// How a connection attempt or connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Established, then dropped.
    Lost,
    /// Never established.
    Failed,
}

impl Outcome {
    pub fn name(&self) -> &'static str {
        match self {
            Outcome::Lost => "lost",
            Outcome::Failed => "failed",
        }
    }
}

impl ReconnectPolicy {
    pub fn delay_for(&self, outcome: Outcome) -> Duration {
        match outcome {
            Outcome::Lost => self.lost_delay,
            Outcome::Failed => self.failed_delay,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Absorbing: no transition leaves this state.
    ShuttingDown,
}

#[derive(Debug)]
pub struct ReconnectSupervisor<E> {
    policy: ReconnectPolicy,
    state: ConnectionState,
    retry: ReschedulableTimer<E>,
}

impl<E: Send + 'static> ReconnectSupervisor<E> {
    pub fn new(policy: ReconnectPolicy, retry: ReschedulableTimer<E>) -> Self {
        Self {
            policy,
            state: ConnectionState::Disconnected,
            retry,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state == ConnectionState::ShuttingDown
    }

    pub fn retry_pending(&self) -> bool {
        self.retry.is_armed()
    }

    /// Start a connection attempt. Returns false if shutting down.
    pub fn begin_attempt(&mut self) -> bool {
        if self.is_shutting_down() {
            return false;
        }
        self.retry.cancel();
        self.state = ConnectionState::Connecting;
        true
    }

    /// The attempt succeeded.
    ///
    /// Returns false when shutdown was requested while connecting; the caller
    /// must close the new connection instead of using it.
    pub fn on_connected(&mut self) -> bool {
        if self.is_shutting_down() {
            return false;
        }
        self.state = ConnectionState::Connected;
        true
    }

    /// The attempt failed. Returns the scheduled retry delay, if any.
    pub fn on_connection_failed(&mut self, reason: &str) -> Option<Duration> {
        self.schedule_retry(Outcome::Failed, reason)
    }

    /// An established connection dropped. Returns the scheduled retry delay, if any.
    pub fn on_connection_lost(&mut self, reason: &str) -> Option<Duration> {
        self.schedule_retry(Outcome::Lost, reason)
    }

    fn schedule_retry(&mut self, outcome: Outcome, reason: &str) -> Option<Duration> {
        if self.is_shutting_down() {
            info!(outcome = outcome.name(), reason = %reason, "not scheduling reconnection attempt");
            return None;
        }
        self.state = ConnectionState::Disconnected;
        let delay = self.policy.delay_for(outcome);
        obs::emit_reconnect_scheduled(outcome.name(), delay, reason);
        self.retry.arm(delay);
        Some(delay)
    }

    /// Handle a token posted by the retry timer. True means "connect now".
    pub fn accept_retry(&mut self, token: TimerToken) -> bool {
        if !self.retry.accept(token) {
            debug!(generation = token.generation(), "ignoring stale reconnect timer");
            return false;
        }
        !self.is_shutting_down()
    }

    /// Enter the absorbing shutdown state and cancel any pending retry.
    ///
    /// Returns whether a connection was up, in which case the caller should
    /// close it gracefully.
    pub fn request_shutdown(&mut self) -> bool {
        let was_connected = self.state == ConnectionState::Connected;
        self.state = ConnectionState::ShuttingDown;
        self.retry.cancel();
        was_connected
    }
}
