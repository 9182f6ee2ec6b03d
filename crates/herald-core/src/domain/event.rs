//! Build lifecycle events delivered by the build-event feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::builder::BuilderState;
use super::result::BuildResult;

/// A single notification from the build engine.
///
/// Serialized with an `event` tag so feeds can be written as JSON lines:
///
/// ```json
/// {"event":"build_finished","builder":"win32","category":"ports","result":"failure","revision":"4711"}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BuildEvent {
    BuilderAdded {
        builder: String,
        #[serde(default)]
        category: Option<String>,
    },
    BuilderRemoved {
        builder: String,
    },
    BuilderStateChanged {
        builder: String,
        state: BuilderState,
    },
    BuildStarted {
        builder: String,
        #[serde(default)]
        category: Option<String>,
    },
    BuildFinished {
        builder: String,
        #[serde(default)]
        category: Option<String>,
        result: BuildResult,
        #[serde(default)]
        revision: Option<String>,
        #[serde(default = "Utc::now")]
        finished_at: DateTime<Utc>,
    },
}

/// Discriminant of [`BuildEvent`], used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuildEventKind {
    BuilderAdded,
    BuilderRemoved,
    BuilderStateChanged,
    BuildStarted,
    BuildFinished,
}

impl BuildEventKind {
    pub const ALL: [BuildEventKind; 5] = [
        BuildEventKind::BuilderAdded,
        BuildEventKind::BuilderRemoved,
        BuildEventKind::BuilderStateChanged,
        BuildEventKind::BuildStarted,
        BuildEventKind::BuildFinished,
    ];
}

impl BuildEvent {
    /// Convenience constructor for a finished build stamped with the current time.
    pub fn finished(
        builder: impl Into<String>,
        category: Option<&str>,
        result: BuildResult,
        revision: Option<&str>,
    ) -> Self {
        BuildEvent::BuildFinished {
            builder: builder.into(),
            category: category.map(str::to_string),
            result,
            revision: revision.map(str::to_string),
            finished_at: Utc::now(),
        }
    }

    pub fn state_changed(builder: impl Into<String>, state: BuilderState) -> Self {
        BuildEvent::BuilderStateChanged {
            builder: builder.into(),
            state,
        }
    }

    pub fn kind(&self) -> BuildEventKind {
        match self {
            BuildEvent::BuilderAdded { .. } => BuildEventKind::BuilderAdded,
            BuildEvent::BuilderRemoved { .. } => BuildEventKind::BuilderRemoved,
            BuildEvent::BuilderStateChanged { .. } => BuildEventKind::BuilderStateChanged,
            BuildEvent::BuildStarted { .. } => BuildEventKind::BuildStarted,
            BuildEvent::BuildFinished { .. } => BuildEventKind::BuildFinished,
        }
    }

    /// Name of the builder this event is about.
    pub fn builder(&self) -> &str {
        match self {
            BuildEvent::BuilderAdded { builder, .. }
            | BuildEvent::BuilderRemoved { builder }
            | BuildEvent::BuilderStateChanged { builder, .. }
            | BuildEvent::BuildStarted { builder, .. }
            | BuildEvent::BuildFinished { builder, .. } => builder,
        }
    }
}
