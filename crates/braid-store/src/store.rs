//! Per-session conversation store with reactive publication
//!
//! One store instance backs one task-detail view. It owns the three input
//! sources (active durable state, persisted archive, live event feed) and
//! publishes the derived merged conversation through a `watch` channel:
//! late subscribers immediately see the latest snapshot, and identical
//! recomputations never notify.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use braid_events::{ConversationItem, ItemStatus, RawEvent};

use crate::error::{Error, Result};
use crate::merge;
use crate::tracker::ItemTracker;

/// Published snapshot of the merged conversation
pub type ConversationSnapshot = Arc<Vec<ConversationItem>>;

/// Durable state for an active session: the backend's coarse-grained event
/// log, refreshed periodically while the agent runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub events: Vec<RawEvent>,
}

/// Descriptive metadata stored alongside an archived session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
}

/// Persisted snapshot of a completed session, used only when there is no
/// active state and no live feed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionArchive {
    #[serde(default)]
    pub events: Vec<RawEvent>,
    #[serde(default)]
    pub metadata: ArchiveMetadata,
}

/// Conversation store for one session view.
///
/// All state is instance-held; two stores never share anything, so multiple
/// concurrent task views cannot bleed into each other.
pub struct ConversationStore {
    session_id: Option<String>,
    /// Items reduced from the active durable state, in event order
    durable: Vec<ConversationItem>,
    has_state: bool,
    /// Items reduced from the persisted archive, all non-streaming
    archive: Vec<ConversationItem>,
    tracker: ItemTracker,
    /// External status patches applied on top of every recomputation
    status_overrides: HashMap<String, ItemStatus>,
    tx: watch::Sender<ConversationSnapshot>,
}

impl ConversationStore {
    /// Create an empty store with no session bound yet
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            session_id: None,
            durable: Vec::new(),
            has_state: false,
            archive: Vec::new(),
            tracker: ItemTracker::new(),
            status_overrides: HashMap::new(),
            tx,
        }
    }

    /// The currently bound session id
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Bind the store to a session. Changing the id clears every input and
    /// all tracker state before anything of the new session is processed,
    /// so stale items cannot bleed across sessions.
    pub fn set_session(&mut self, session_id: impl Into<String>) {
        let session_id = session_id.into();
        if self.session_id.as_deref() == Some(session_id.as_str()) {
            return;
        }
        tracing::debug!(session_id = %session_id, "switching session, clearing state");
        self.session_id = Some(session_id);
        self.durable.clear();
        self.has_state = false;
        self.archive.clear();
        self.tracker.reset();
        self.status_overrides.clear();
        self.recompute();
    }

    /// Replace the active durable state. `None` means no active session
    /// state exists (the task is not running).
    pub fn set_state(&mut self, state: Option<SessionState>) {
        match state {
            Some(state) => {
                self.has_state = true;
                self.durable = reduce_events(&state.events);
            }
            None => {
                self.has_state = false;
                self.durable.clear();
            }
        }
        self.recompute();
    }

    /// Replace the persisted archive used as the lowest-priority fallback
    /// for completed sessions. Archived items are never streaming.
    pub fn set_archive(&mut self, archive: Option<SessionArchive>) {
        match archive {
            Some(archive) => {
                let mut items = reduce_events(&archive.events);
                for item in &mut items {
                    item.is_streaming = false;
                }
                self.archive = items;
            }
            None => self.archive.clear(),
        }
        self.recompute();
    }

    /// Apply one live event and republish
    pub fn apply_live_event(&mut self, event: &RawEvent) {
        self.tracker.apply(event);
        self.recompute();
    }

    /// Apply a batch of live events in delivery order and republish once.
    /// Feeding the same array again is safe: processed events are no-ops.
    pub fn apply_live_events<'a>(&mut self, events: impl IntoIterator<Item = &'a RawEvent>) {
        self.tracker.apply_all(events);
        self.recompute();
    }

    /// Decode one live event from raw JSON and apply it
    pub fn apply_live_json(&mut self, value: serde_json::Value) -> Result<()> {
        let event = RawEvent::from_value(value)?;
        self.apply_live_event(&event);
        Ok(())
    }

    /// Patch one item's status outside the normal event flow (e.g. a human
    /// approval decision) and republish
    pub fn update_item_status(&mut self, item_id: &str, status: ItemStatus) -> Result<()> {
        let known = self.tx.borrow().iter().any(|item| item.id == item_id);
        if !known {
            return Err(Error::UnknownItem(item_id.to_string()));
        }
        self.status_overrides.insert(item_id.to_string(), status);
        self.recompute();
        Ok(())
    }

    /// The current merged conversation
    pub fn conversation(&self) -> ConversationSnapshot {
        self.tx.borrow().clone()
    }

    /// Subscribe to merged-conversation updates. The receiver immediately
    /// holds the latest snapshot; `changed().await` yields on every
    /// observable change and never on bookkeeping-only recomputations.
    pub fn subscribe(&self) -> watch::Receiver<ConversationSnapshot> {
        self.tx.subscribe()
    }

    /// The subscription as an async stream of snapshots
    pub fn updates(&self) -> WatchStream<ConversationSnapshot> {
        WatchStream::new(self.subscribe())
    }

    /// Recompute the merged conversation and publish it if it differs from
    /// the previous emission.
    fn recompute(&mut self) {
        let mut items = if self.has_state {
            merge::merge(&self.durable, &self.tracker)
        } else if !self.tracker.is_empty() {
            // No durable state yet, but the live feed is ahead of it
            merge::merge(&[], &self.tracker)
        } else {
            // Completed session: show the archive verbatim
            self.archive.clone()
        };

        for item in &mut items {
            if let Some(status) = self.status_overrides.get(&item.id) {
                item.status = *status;
            }
        }

        self.tx.send_if_modified(|current| {
            if **current == items {
                false
            } else {
                *current = Arc::new(items);
                true
            }
        });
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Reduce an ordered event log to conversation items by replaying it
/// through a scratch tracker
fn reduce_events(events: &[RawEvent]) -> Vec<ConversationItem> {
    let mut tracker = ItemTracker::new();
    tracker.apply_all(events);
    tracker.items().cloned().collect()
}
