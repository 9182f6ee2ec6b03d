//! Build Herald domain model.
//!
//! The types here describe what the build farm reports to us:
//! - `BuildResult`: outcome of a single build
//! - `BuilderState` / `BuilderSnapshot`: read-only view of one builder
//! - `BuildEvent`: lifecycle notifications delivered by the build-event feed

pub mod builder;
pub mod event;
pub mod result;

pub use builder::{BuilderSnapshot, BuilderState};
pub use event::{BuildEvent, BuildEventKind};
pub use result::BuildResult;
