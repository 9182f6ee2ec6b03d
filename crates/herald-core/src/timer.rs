//! Reschedulable one-shot timer.
//!
//! A [`ReschedulableTimer`] posts an event into an mpsc channel once its
//! delay has elapsed. Arming it again always supersedes the previous arm.
//! Every arm gets a fresh [`TimerToken`]; the owner passes received tokens to
//! [`ReschedulableTimer::accept`], which rejects tokens from superseded arms
//! whose event was already queued before the abort landed.

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Identifies one arm of a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

impl TimerToken {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

pub struct ReschedulableTimer<E> {
    tx: UnboundedSender<E>,
    make_event: fn(TimerToken) -> E,
    generation: u64,
    handle: Option<JoinHandle<()>>,
    deadline: Option<Instant>,
}

impl<E: Send + 'static> ReschedulableTimer<E> {
    /// `make_event` wraps the token into whatever the owner's channel carries.
    pub fn new(tx: UnboundedSender<E>, make_event: fn(TimerToken) -> E) -> Self {
        Self {
            tx,
            make_event,
            generation: 0,
            handle: None,
            deadline: None,
        }
    }

    /// Cancel any outstanding arm and start a new one.
    pub fn arm(&mut self, delay: Duration) -> TimerToken {
        self.cancel();
        self.generation += 1;
        let token = TimerToken(self.generation);
        let event = (self.make_event)(token);
        let tx = self.tx.clone();
        let deadline = Instant::now() + delay;

        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            // Receiver gone means the owner shut down.
            let _ = tx.send(event);
        }));
        self.deadline = Some(deadline);
        token
    }

    /// Cancel the outstanding arm. Returns whether one was armed.
    pub fn cancel(&mut self) -> bool {
        self.deadline = None;
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Claim a received token. Only the current arm's token is accepted;
    /// accepting it disarms the timer.
    pub fn accept(&mut self, token: TimerToken) -> bool {
        if self.handle.is_some() && token.0 == self.generation {
            self.handle = None;
            self.deadline = None;
            true
        } else {
            false
        }
    }
}

impl<E> Drop for ReschedulableTimer<E> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl<E> fmt::Debug for ReschedulableTimer<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReschedulableTimer")
            .field("generation", &self.generation)
            .field("armed", &self.handle.is_some())
            .field("deadline", &self.deadline)
            .finish()
    }
}
