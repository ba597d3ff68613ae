//! A cheap-clone handle for sharing one store between producers and consumers

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use braid_events::{ItemStatus, RawEvent};

use crate::error::Result;
use crate::store::{ConversationSnapshot, ConversationStore, SessionArchive, SessionState};

/// A cloneable handle around a [`ConversationStore`].
///
/// A transport callback pushing events and a view reading snapshots can
/// hold clones of the same handle. The mutex guards whole operations and is
/// never held across an await; subscribers read through the `watch` channel
/// without touching the lock at all.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<Mutex<ConversationStore>>,
}

impl StoreHandle {
    /// Wrap a store in a shareable handle
    pub fn new(store: ConversationStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Bind the store to a session, clearing state if the id changed
    pub fn set_session(&self, session_id: impl Into<String>) {
        self.inner.lock().set_session(session_id);
    }

    /// Replace the active durable state
    pub fn set_state(&self, state: Option<SessionState>) {
        self.inner.lock().set_state(state);
    }

    /// Replace the persisted archive fallback
    pub fn set_archive(&self, archive: Option<SessionArchive>) {
        self.inner.lock().set_archive(archive);
    }

    /// Apply one live event
    pub fn apply_live_event(&self, event: &RawEvent) {
        self.inner.lock().apply_live_event(event);
    }

    /// Apply a batch of live events in delivery order
    pub fn apply_live_events(&self, events: &[RawEvent]) {
        self.inner.lock().apply_live_events(events);
    }

    /// Decode one live event from raw JSON and apply it
    pub fn apply_live_json(&self, value: serde_json::Value) -> Result<()> {
        self.inner.lock().apply_live_json(value)
    }

    /// Patch one item's status outside the normal event flow
    pub fn update_item_status(&self, item_id: &str, status: ItemStatus) -> Result<()> {
        self.inner.lock().update_item_status(item_id, status)
    }

    /// The current merged conversation
    pub fn conversation(&self) -> ConversationSnapshot {
        self.inner.lock().conversation()
    }

    /// Subscribe to merged-conversation updates
    pub fn subscribe(&self) -> watch::Receiver<ConversationSnapshot> {
        self.inner.lock().subscribe()
    }

    /// The subscription as an async stream of snapshots
    pub fn updates(&self) -> WatchStream<ConversationSnapshot> {
        self.inner.lock().updates()
    }
}

impl Default for StoreHandle {
    fn default() -> Self {
        Self::new(ConversationStore::new())
    }
}
