//! In-flight item tracking
//!
//! The tracker maintains the live overlay: every item currently being
//! assembled from the streaming feed, keyed by item id. Events are applied
//! in delivery order, but text reconstruction is sequence-number ordered, so
//! reordered fragment delivery still converges on the correct string.
//!
//! State lives inside the tracker instance, never in module globals, so
//! concurrent conversation views cannot bleed into each other.

use std::collections::{HashMap, HashSet};

use braid_events::{
    ConversationItem, DeltaBuffer, DeltaKind, DeltaSlot, EventClass, EventKey, ItemKind,
    ItemPayload, ItemStatus, LifecyclePhase, RawEvent, SummaryPhase, parse_timestamp,
};

/// Per-item state machine: absent -> pending -> accumulating -> terminal.
///
/// Every processed event is recorded by its `(type, item id, sequence)` key;
/// redelivered events are no-ops. An item that reached a terminal state never
/// re-enters streaming within one tracker lifetime.
#[derive(Debug, Default)]
pub struct ItemTracker {
    items: HashMap<String, ConversationItem>,
    /// Item ids in first-seen order, for stable output of live-only items
    order: Vec<String>,
    processed: HashSet<EventKey>,
    deltas: DeltaBuffer,
}

impl ItemTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event. Malformed events are dropped with a diagnostic;
    /// duplicates (same type, item id, and sequence number) are no-ops.
    pub fn apply(&mut self, event: &RawEvent) {
        if !self.processed.insert(event.key()) {
            return;
        }
        match event.classify() {
            EventClass::Lifecycle(phase) => self.apply_lifecycle(event, phase),
            EventClass::Delta(kind) => self.apply_delta(event, kind),
            EventClass::SummaryPart(phase) => self.apply_summary_part(event, phase),
            EventClass::Error => self.apply_error(event),
            EventClass::Unknown => {
                tracing::debug!(event_type = %event.event_type, "ignoring unknown event type");
            }
        }
    }

    /// Apply a batch of events in delivery order
    pub fn apply_all<'a>(&mut self, events: impl IntoIterator<Item = &'a RawEvent>) {
        for event in events {
            self.apply(event);
        }
    }

    /// Look up an in-flight item by id
    pub fn get(&self, id: &str) -> Option<&ConversationItem> {
        self.items.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    /// Iterate items in first-seen order
    pub fn items(&self) -> impl Iterator<Item = &ConversationItem> {
        self.order.iter().filter_map(|id| self.items.get(id))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Clear all state: items, processed-event set, and delta buffers.
    /// Called when the session identity changes, before any event of the new
    /// session is applied.
    pub fn reset(&mut self) {
        self.items.clear();
        self.order.clear();
        self.processed.clear();
        self.deltas.clear();
    }

    // ---- event appliers ----

    fn apply_lifecycle(&mut self, event: &RawEvent, phase: LifecyclePhase) {
        let Some(id) = event.item_id().map(str::to_string) else {
            tracing::debug!(event_type = %event.event_type, "dropping lifecycle event without item id");
            return;
        };
        match phase {
            LifecyclePhase::Created | LifecyclePhase::Added => self.start_item(event, &id),
            LifecyclePhase::Done => self.finish_item(event, &id),
            LifecyclePhase::Failed => self.fail_item(event, &id),
        }
    }

    fn start_item(&mut self, event: &RawEvent, id: &str) {
        let item = self.ensure_item(id, event);
        if let Some(snap) = &event.item {
            item.absorb_snapshot(snap);
        }
        // A terminal item never re-enters streaming
        if !item.status.is_terminal() {
            item.is_streaming = true;
            item.status = ItemStatus::InProgress;
        }
        if item.started_at.is_none() {
            item.started_at = event.timestamp.clone();
        }
        if item.timestamp.is_none() {
            item.timestamp = event.timestamp.clone();
        }
        item.source_event = Some(Box::new(event.clone()));
        debug_assert!(
            !(item.is_streaming && item.status.is_terminal()),
            "terminal item must not be streaming"
        );
    }

    fn finish_item(&mut self, event: &RawEvent, id: &str) {
        let item = self.ensure_item(id, event);
        if let Some(snap) = &event.item {
            item.absorb_snapshot(snap);
        }
        // A full text on the event wins over buffered fragments
        if let Some(text) = &event.text {
            item.set_text(text);
        }
        item.is_streaming = false;
        if item.status != ItemStatus::Failed {
            item.status = ItemStatus::Completed;
        }
        if item.ended_at.is_none() {
            item.ended_at = event.timestamp.clone();
        }
        if item.duration_seconds.is_none() {
            if let (Some(start), Some(end)) = (&item.started_at, &item.ended_at) {
                item.duration_seconds = duration_seconds(start, end);
            }
        }
        item.source_event = Some(Box::new(event.clone()));
        self.deltas.clear_item(id);
    }

    fn fail_item(&mut self, event: &RawEvent, id: &str) {
        let item = self.ensure_item(id, event);
        if let Some(snap) = &event.item {
            item.absorb_snapshot(snap);
        }
        item.is_streaming = false;
        item.status = ItemStatus::Failed;
        if let Some(error) = &event.error {
            item.error = Some(error.clone());
        }
        if item.ended_at.is_none() {
            item.ended_at = event.timestamp.clone();
        }
        item.source_event = Some(Box::new(event.clone()));
        self.deltas.clear_item(id);
    }

    fn apply_delta(&mut self, event: &RawEvent, kind: DeltaKind) {
        let Some(id) = event.item_id().map(str::to_string) else {
            tracing::debug!(event_type = %event.event_type, "dropping delta without item id");
            return;
        };
        let Some(fragment) = event.delta_fragment().map(str::to_string) else {
            tracing::debug!(event_type = %event.event_type, item_id = %id, "dropping malformed delta fragment");
            return;
        };
        // Terminal content is already authoritative; a straggler fragment
        // must not reopen the buffer
        if self.items.get(&id).is_some_and(|i| i.status.is_terminal()) {
            tracing::debug!(item_id = %id, "dropping delta for terminal item");
            return;
        }

        let summary_index = event.summary_index.unwrap_or(0);
        let slot = match kind {
            DeltaKind::Text => DeltaSlot::content(id.as_str()),
            DeltaKind::Reasoning => DeltaSlot::summary(id.as_str(), summary_index),
        };
        self.deltas.insert(slot.clone(), event.sequence_number, fragment);
        let reconstructed = self.deltas.reconstruct(&slot);

        let item = self.ensure_item(&id, event);
        item.is_streaming = true;
        if item.status == ItemStatus::Pending {
            item.status = ItemStatus::InProgress;
        }
        match kind {
            DeltaKind::Text => item.set_text(&reconstructed),
            DeltaKind::Reasoning => {
                if let ItemPayload::Reasoning { summary } = &mut item.payload {
                    if summary.len() <= summary_index {
                        summary.resize(summary_index + 1, String::new());
                    }
                    summary[summary_index] = reconstructed;
                }
            }
        }
        item.source_event = Some(Box::new(event.clone()));
    }

    fn apply_summary_part(&mut self, event: &RawEvent, phase: SummaryPhase) {
        let Some(id) = event.item_id().map(str::to_string) else {
            tracing::debug!(event_type = %event.event_type, "dropping summary part without item id");
            return;
        };
        let Some(index) = event.summary_index else {
            tracing::debug!(item_id = %id, "dropping summary part without index");
            return;
        };
        let finalized = match phase {
            SummaryPhase::Added => None,
            SummaryPhase::Done => Some(event.text.clone().unwrap_or_else(|| {
                self.deltas.reconstruct(&DeltaSlot::summary(id.as_str(), index))
            })),
        };

        let item = self.ensure_item(&id, event);
        if item.status.is_terminal() {
            return;
        }
        item.is_streaming = true;
        if item.status == ItemStatus::Pending {
            item.status = ItemStatus::InProgress;
        }
        if let ItemPayload::Reasoning { summary } = &mut item.payload {
            // The slot array grows to the highest index seen, never shrinks
            if summary.len() <= index {
                summary.resize(index + 1, String::new());
            }
            if let Some(text) = finalized {
                summary[index] = text;
            }
        }
        item.source_event = Some(Box::new(event.clone()));
    }

    fn apply_error(&mut self, event: &RawEvent) {
        // The deterministic fallback id keeps replay idempotent when the
        // event carries no item id of its own
        let id = event
            .item_id()
            .map(str::to_string)
            .unwrap_or_else(|| format!("error-{}", event.sequence_number));
        let detail = event.error.clone().unwrap_or_default();

        if !self.items.contains_key(&id) {
            self.order.push(id.clone());
            self.items.insert(
                id.clone(),
                ConversationItem::skeleton(id.as_str(), ItemKind::Error),
            );
        }
        if let Some(item) = self.items.get_mut(&id) {
            item.kind = ItemKind::Error;
            item.payload = ItemPayload::Error {
                error: detail.clone(),
            };
            item.error = Some(detail);
            item.status = ItemStatus::Failed;
            item.is_streaming = false;
            if item.timestamp.is_none() {
                item.timestamp = event.timestamp.clone();
            }
            item.source_event = Some(Box::new(event.clone()));
        }
        self.deltas.clear_item(&id);
    }

    fn ensure_item(&mut self, id: &str, event: &RawEvent) -> &mut ConversationItem {
        if !self.items.contains_key(id) {
            self.order.push(id.to_string());
        }
        self.items.entry(id.to_string()).or_insert_with(|| match &event.item {
            Some(snap) => ConversationItem::from_snapshot(snap),
            None => ConversationItem::skeleton(id, ItemKind::classify(&event.event_type)),
        })
    }
}

/// Whole-second duration between two RFC 3339 timestamps, rounded.
/// Unparseable timestamps yield no duration rather than an error.
fn duration_seconds(start: &str, end: &str) -> Option<i64> {
    let start = parse_timestamp(start).ok()?;
    let end = parse_timestamp(end).ok()?;
    let millis = end.signed_duration_since(start).num_milliseconds();
    Some((millis as f64 / 1000.0).round() as i64)
}
