//! Build-event feed: an observer registry keyed by event kind.
//!
//! Handlers are invoked synchronously, in registration order, for every
//! published event of the kind they subscribed to. The feed knows nothing
//! about chat sessions; subscribers decide what to do with events.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

use crate::domain::{BuildEvent, BuildEventKind};
use crate::error::Result;
use crate::registry::MemoryRegistry;

/// Callback invoked for each published event.
pub type EventHandler = Arc<dyn Fn(&BuildEvent) + Send + Sync>;

/// Handle returned by [`BuildEventFeed::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type HandlerMap = BTreeMap<BuildEventKind, Vec<(SubscriptionId, EventHandler)>>;

#[derive(Default)]
pub struct BuildEventFeed {
    handlers: RwLock<HandlerMap>,
    next_id: AtomicU64,
}

impl BuildEventFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for one event kind.
    pub fn subscribe(&self, kind: BuildEventKind, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(kind)
            .or_default()
            .push((id, handler));
        id
    }

    /// Register `handler` for every event kind.
    pub fn subscribe_all(&self, handler: EventHandler) -> Vec<SubscriptionId> {
        BuildEventKind::ALL
            .into_iter()
            .map(|kind| self.subscribe(kind, handler.clone()))
            .collect()
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        let mut removed = false;
        for list in handlers.values_mut() {
            let before = list.len();
            list.retain(|(sid, _)| *sid != id);
            removed |= list.len() != before;
        }
        removed
    }

    /// Deliver `event` to its subscribers. Returns how many handlers ran.
    pub fn publish(&self, event: &BuildEvent) -> usize {
        // Clone the list so handlers may (un)subscribe without deadlocking.
        let targets: Vec<EventHandler> = self
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&event.kind())
            .map(|list| list.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();

        for handler in &targets {
            handler(event);
        }
        targets.len()
    }

    pub fn subscriber_count(&self, kind: BuildEventKind) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&kind)
            .map_or(0, Vec::len)
    }
}

/// Read newline-delimited JSON [`BuildEvent`]s, apply each to `registry`,
/// then publish it on `feed`.
///
/// Blank lines are skipped. Malformed lines are logged and skipped. Returns
/// the number of events published once the reader hits EOF.
pub async fn pump_json_lines<R>(
    reader: R,
    registry: &MemoryRegistry,
    feed: &BuildEventFeed,
) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut published = 0;
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<BuildEvent>(line) {
            Ok(event) => {
                debug!(line = line_no, kind = ?event.kind(), builder = %event.builder(), "feed event");
                registry.apply(&event);
                feed.publish(&event);
                published += 1;
            }
            Err(e) => {
                warn!(line = line_no, error = %e, "skipping malformed feed line");
            }
        }
    }
    Ok(published)
}
