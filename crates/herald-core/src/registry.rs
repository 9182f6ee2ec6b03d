//! Builder registry queries.
//!
//! The build engine owns builder state; the notifier only reads it through
//! [`BuilderRegistry`]. [`MemoryRegistry`] is an in-process implementation
//! kept current by applying feed events to it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::{BuildEvent, BuildResult, BuilderSnapshot, BuilderState};

/// Which builders the notifier cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(BTreeSet<String>),
}

impl CategoryFilter {
    pub fn only<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CategoryFilter::Only(categories.into_iter().map(Into::into).collect())
    }

    /// Whether a builder with the given category passes the filter.
    ///
    /// Uncategorised builders never pass a restricted filter.
    pub fn matches(&self, category: Option<&str>) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(set) => category.is_some_and(|c| set.contains(c)),
        }
    }
}

impl From<Option<BTreeSet<String>>> for CategoryFilter {
    fn from(categories: Option<BTreeSet<String>>) -> Self {
        categories.map_or(CategoryFilter::All, CategoryFilter::Only)
    }
}

/// Read-only view over the known builders.
pub trait BuilderRegistry: Send + Sync {
    /// Names of builders passing `filter`, sorted ascending.
    fn list_builders(&self, filter: &CategoryFilter) -> Vec<String>;

    /// Current activity state, `None` for unknown builders.
    fn state(&self, name: &str) -> Option<BuilderState>;

    /// `(previous, current)` terminal results.
    fn last_two_results(&self, name: &str) -> (Option<BuildResult>, Option<BuildResult>);

    /// Registered category, `None` for unknown or uncategorised builders.
    fn category(&self, name: &str) -> Option<String>;
}

/// Builders whose most recent result is a failure, sorted ascending.
pub fn failing_builders(registry: &dyn BuilderRegistry, filter: &CategoryFilter) -> Vec<String> {
    registry
        .list_builders(filter)
        .into_iter()
        .filter(|name| registry.last_two_results(name).1 == Some(BuildResult::Failure))
        .collect()
}

/// Whether every builder passing `filter` is idle.
pub fn all_idle(registry: &dyn BuilderRegistry, filter: &CategoryFilter) -> bool {
    registry
        .list_builders(filter)
        .iter()
        .all(|name| registry.state(name).is_some_and(|s| s.is_idle()))
}

/// In-memory registry backed by a `BTreeMap<name, snapshot>`.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    builders: Mutex<BTreeMap<String, BuilderSnapshot>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, BuilderSnapshot>> {
        self.builders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a builder.
    pub fn insert(&self, snapshot: BuilderSnapshot) {
        self.lock().insert(snapshot.name.clone(), snapshot);
    }

    pub fn snapshot(&self, name: &str) -> Option<BuilderSnapshot> {
        self.lock().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Update the registry from a feed event.
    ///
    /// Must run before the event is published so that subscribers reading
    /// `last_two_results` see the build that just finished.
    pub fn apply(&self, event: &BuildEvent) {
        let mut builders = self.lock();
        match event {
            BuildEvent::BuilderAdded { builder, category } => {
                builders
                    .entry(builder.clone())
                    .and_modify(|b| b.category = category.clone())
                    .or_insert_with(|| BuilderSnapshot::new(builder.clone(), category.clone()));
            }
            BuildEvent::BuilderRemoved { builder } => {
                builders.remove(builder);
            }
            BuildEvent::BuilderStateChanged { builder, state } => {
                builders
                    .entry(builder.clone())
                    .or_insert_with(|| BuilderSnapshot::new(builder.clone(), None))
                    .state = *state;
            }
            BuildEvent::BuildStarted { builder, category } => {
                let entry = builders
                    .entry(builder.clone())
                    .or_insert_with(|| BuilderSnapshot::new(builder.clone(), category.clone()));
                if category.is_some() {
                    entry.category = category.clone();
                }
            }
            BuildEvent::BuildFinished {
                builder,
                category,
                result,
                ..
            } => {
                let entry = builders
                    .entry(builder.clone())
                    .or_insert_with(|| BuilderSnapshot::new(builder.clone(), category.clone()));
                if category.is_some() {
                    entry.category = category.clone();
                }
                entry.record(*result);
            }
        }
    }
}

impl BuilderRegistry for MemoryRegistry {
    fn list_builders(&self, filter: &CategoryFilter) -> Vec<String> {
        // BTreeMap iteration is already sorted by name.
        self.lock()
            .values()
            .filter(|b| filter.matches(b.category.as_deref()))
            .map(|b| b.name.clone())
            .collect()
    }

    fn state(&self, name: &str) -> Option<BuilderState> {
        self.lock().get(name).map(|b| b.state)
    }

    fn last_two_results(&self, name: &str) -> (Option<BuildResult>, Option<BuildResult>) {
        self.lock()
            .get(name)
            .map(BuilderSnapshot::last_two_results)
            .unwrap_or((None, None))
    }

    fn category(&self, name: &str) -> Option<String> {
        self.lock().get(name).and_then(|b| b.category.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(results: Vec<(&str, Option<&str>, Vec<BuildResult>)>) -> MemoryRegistry {
        let registry = MemoryRegistry::new();
        for (name, category, history) in results {
            let mut b = BuilderSnapshot::new(name, category.map(str::to_string));
            for r in history {
                b.record(r);
            }
            registry.insert(b);
        }
        registry
    }

    #[test]
    fn test_category_filter_matches() {
        let filter = CategoryFilter::only(["ports"]);
        assert!(filter.matches(Some("ports")));
        assert!(!filter.matches(Some("tools")));
        assert!(!filter.matches(None));
        assert!(CategoryFilter::All.matches(None));
    }

    #[test]
    fn test_list_builders_is_sorted_and_filtered() {
        let registry = registry_with(vec![
            ("win32", Some("ports"), vec![]),
            ("docs", Some("tools"), vec![]),
            ("dc", Some("ports"), vec![]),
        ]);
        assert_eq!(
            registry.list_builders(&CategoryFilter::All),
            vec!["dc", "docs", "win32"]
        );
        assert_eq!(
            registry.list_builders(&CategoryFilter::only(["ports"])),
            vec!["dc", "win32"]
        );
    }

    #[test]
    fn test_failing_builders_uses_last_result() {
        let registry = registry_with(vec![
            ("win32", None, vec![BuildResult::Success, BuildResult::Failure]),
            ("linux", None, vec![BuildResult::Failure, BuildResult::Success]),
            ("amiga", None, vec![BuildResult::Failure]),
            ("psp", None, vec![BuildResult::Failure, BuildResult::Warnings]),
        ]);
        assert_eq!(
            failing_builders(&registry, &CategoryFilter::All),
            vec!["amiga", "win32"]
        );
    }

    #[test]
    fn test_all_idle() {
        let registry = MemoryRegistry::new();
        assert!(all_idle(&registry, &CategoryFilter::All));

        registry.apply(&BuildEvent::state_changed("linux", BuilderState::Idle));
        registry.apply(&BuildEvent::state_changed("win32", BuilderState::Building));
        assert!(!all_idle(&registry, &CategoryFilter::All));

        registry.apply(&BuildEvent::state_changed("win32", BuilderState::Idle));
        assert!(all_idle(&registry, &CategoryFilter::All));
    }

    #[test]
    fn test_apply_finished_records_history() {
        let registry = MemoryRegistry::new();
        registry.apply(&BuildEvent::BuilderAdded {
            builder: "win32".to_string(),
            category: Some("ports".to_string()),
        });
        registry.apply(&BuildEvent::finished("win32", None, BuildResult::Success, Some("1")));
        registry.apply(&BuildEvent::finished("win32", None, BuildResult::Failure, Some("2")));

        assert_eq!(
            registry.last_two_results("win32"),
            (Some(BuildResult::Success), Some(BuildResult::Failure))
        );
        let snapshot = registry.snapshot("win32").unwrap();
        assert_eq!(snapshot.category.as_deref(), Some("ports"));
        assert_eq!(registry.category("win32").as_deref(), Some("ports"));
        assert_eq!(registry.category("amiga"), None);
    }

    #[test]
    fn test_apply_removed_forgets_builder() {
        let registry = registry_with(vec![("win32", None, vec![BuildResult::Failure])]);
        registry.apply(&BuildEvent::BuilderRemoved {
            builder: "win32".to_string(),
        });
        assert!(registry.is_empty());
        assert_eq!(registry.last_two_results("win32"), (None, None));
        assert_eq!(registry.state("win32"), None);
    }
}
