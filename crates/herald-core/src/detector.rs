//! Transition detection between terminal build results.

use serde::{Deserialize, Serialize};

use crate::domain::BuildResult;

/// Which way a builder flipped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    ToSuccess,
    ToFailure,
}

/// A detected success/failure flip for one builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub builder: String,
    pub direction: Direction,
    pub revision: Option<String>,
}

/// Decide whether `current` is a reportable flip from `previous`.
///
/// Only Success <-> Failure flips count. A missing or non-terminal previous
/// result means there is no baseline yet.
pub fn detect(
    builder: &str,
    previous: Option<BuildResult>,
    current: BuildResult,
    revision: Option<String>,
) -> Option<Edge> {
    if !current.is_terminal_comparable() {
        return None;
    }
    let previous = previous.filter(BuildResult::is_terminal_comparable)?;
    if previous == current {
        return None;
    }

    let direction = if current == BuildResult::Success {
        Direction::ToSuccess
    } else {
        Direction::ToFailure
    };
    Some(Edge {
        builder: builder.to_string(),
        direction,
        revision,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_over_all_result_pairs() {
        for prev in BuildResult::ALL {
            for cur in BuildResult::ALL {
                let edge = detect("linux", Some(prev), cur, None);
                let expected = prev.is_terminal_comparable()
                    && cur.is_terminal_comparable()
                    && prev != cur;
                assert_eq!(edge.is_some(), expected, "prev={prev} cur={cur}");
            }
        }
    }

    #[test]
    fn test_direction_follows_current_result() {
        let edge = detect(
            "win32",
            Some(BuildResult::Success),
            BuildResult::Failure,
            Some("4711".to_string()),
        )
        .unwrap();
        assert_eq!(edge.direction, Direction::ToFailure);
        assert_eq!(edge.builder, "win32");
        assert_eq!(edge.revision.as_deref(), Some("4711"));

        let edge = detect("win32", Some(BuildResult::Failure), BuildResult::Success, None).unwrap();
        assert_eq!(edge.direction, Direction::ToSuccess);
    }

    #[test]
    fn test_no_baseline_means_no_edge() {
        assert!(detect("dc", None, BuildResult::Failure, None).is_none());
        assert!(detect("dc", None, BuildResult::Success, None).is_none());
    }
}
