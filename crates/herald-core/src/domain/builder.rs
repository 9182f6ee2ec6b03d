//! Read-only builder view.

use serde::{Deserialize, Serialize};

use super::result::BuildResult;

/// How many terminal results a snapshot keeps around.
pub const HISTORY_DEPTH: usize = 2;

/// Activity state of a builder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum BuilderState {
    #[default]
    Idle,
    Building,
    Offline,
}

impl BuilderState {
    pub fn is_idle(&self) -> bool {
        matches!(self, BuilderState::Idle)
    }
}

/// A named build configuration as seen by the notifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuilderSnapshot {
    pub name: String,

    /// Optional tag used by category filters.
    pub category: Option<String>,

    pub state: BuilderState,

    /// Most recent results, oldest first. At most [`HISTORY_DEPTH`] entries.
    pub history: Vec<BuildResult>,
}

impl BuilderSnapshot {
    pub fn new(name: impl Into<String>, category: Option<String>) -> Self {
        Self {
            name: name.into(),
            category,
            state: BuilderState::Idle,
            history: Vec::new(),
        }
    }

    /// Record a finished build, dropping results older than the last two.
    pub fn record(&mut self, result: BuildResult) {
        self.history.push(result);
        if self.history.len() > HISTORY_DEPTH {
            let excess = self.history.len() - HISTORY_DEPTH;
            self.history.drain(..excess);
        }
    }

    pub fn last_result(&self) -> Option<BuildResult> {
        self.history.last().copied()
    }

    pub fn previous_result(&self) -> Option<BuildResult> {
        self.history.iter().rev().nth(1).copied()
    }

    /// `(previous, current)` pair used by edge detection.
    pub fn last_two_results(&self) -> (Option<BuildResult>, Option<BuildResult>) {
        (self.previous_result(), self.last_result())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_keeps_last_two() {
        let mut b = BuilderSnapshot::new("linux", None);
        assert_eq!(b.last_two_results(), (None, None));

        b.record(BuildResult::Success);
        assert_eq!(b.last_two_results(), (None, Some(BuildResult::Success)));

        b.record(BuildResult::Failure);
        b.record(BuildResult::Warnings);
        assert_eq!(b.history.len(), HISTORY_DEPTH);
        assert_eq!(
            b.last_two_results(),
            (Some(BuildResult::Failure), Some(BuildResult::Warnings))
        );
    }

    #[test]
    fn test_new_builder_is_idle() {
        assert!(BuilderSnapshot::new("win32", Some("ports".into())).state.is_idle());
        assert!(!BuilderState::Building.is_idle());
        assert!(!BuilderState::Offline.is_idle());
    }
}
