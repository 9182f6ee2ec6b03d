//! Build outcomes.

use serde::{Deserialize, Serialize};

/// Outcome of one finished build.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BuildResult {
    Success,
    Warnings,
    Failure,
    Exception,
    Skipped,
}

impl BuildResult {
    /// All outcomes, in declaration order.
    pub const ALL: [BuildResult; 5] = [
        BuildResult::Success,
        BuildResult::Warnings,
        BuildResult::Failure,
        BuildResult::Exception,
        BuildResult::Skipped,
    ];

    /// Whether this outcome takes part in edge detection.
    ///
    /// Only `Success` and `Failure` do; warnings, exceptions and skipped
    /// builds are never a reportable state.
    pub fn is_terminal_comparable(&self) -> bool {
        matches!(self, BuildResult::Success | BuildResult::Failure)
    }

    pub fn name(&self) -> &'static str {
        match self {
            BuildResult::Success => "success",
            BuildResult::Warnings => "warnings",
            BuildResult::Failure => "failure",
            BuildResult::Exception => "exception",
            BuildResult::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for BuildResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_success_and_failure_are_comparable() {
        let comparable: Vec<BuildResult> = BuildResult::ALL
            .into_iter()
            .filter(BuildResult::is_terminal_comparable)
            .collect();
        assert_eq!(comparable, vec![BuildResult::Success, BuildResult::Failure]);
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&BuildResult::Warnings).unwrap();
        assert_eq!(json, "\"warnings\"");
        let parsed: BuildResult = serde_json::from_str("\"exception\"").unwrap();
        assert_eq!(parsed, BuildResult::Exception);
    }
}
