//! Raw streaming-event model and classification
//!
//! A [`RawEvent`] is the single typed input contract for both event sources.
//! The backend's dotted type names are kept verbatim in `event_type` and
//! resolved into a processing category by [`RawEvent::classify`]; there is no
//! shape guessing past the serde boundary.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::item::{ErrorDetail, ItemSnapshot};

/// Lifecycle transition carried by an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Created,
    Added,
    Done,
    Failed,
}

/// Which text channel a delta fragment belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaKind {
    Text,
    Reasoning,
}

/// Phase of an indexed reasoning summary part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryPhase {
    Added,
    Done,
}

/// Processing category of a raw event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
    Lifecycle(LifecyclePhase),
    Delta(DeltaKind),
    SummaryPart(SummaryPhase),
    Error,
    Unknown,
}

/// Idempotency key for processed-event tracking
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventKey {
    event_type: String,
    item_id: Option<String>,
    sequence: u64,
}

/// One event from either input source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Raw type name, e.g. `response.output_item.added`
    #[serde(rename = "type")]
    pub event_type: String,
    /// Source-assigned ordering key; delivery order is not guaranteed to
    /// match it
    pub sequence_number: u64,
    #[serde(default)]
    pub item_id: Option<String>,
    /// Item snapshot embedded in lifecycle events
    #[serde(default)]
    pub item: Option<ItemSnapshot>,
    /// Incremental fragment; only applied when it is a non-empty string
    #[serde(default)]
    pub delta: Option<serde_json::Value>,
    /// Complete final text, authoritative over buffered fragments
    #[serde(default)]
    pub text: Option<String>,
    /// Slot index for multi-part reasoning summaries
    #[serde(default)]
    pub summary_index: Option<usize>,
    /// RFC 3339 timestamp, when the source provided one
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub error: Option<ErrorDetail>,
}

impl RawEvent {
    fn bare(event_type: impl Into<String>, sequence: u64) -> Self {
        Self {
            event_type: event_type.into(),
            sequence_number: sequence,
            item_id: None,
            item: None,
            delta: None,
            text: None,
            summary_index: None,
            timestamp: None,
            error: None,
        }
    }

    /// A `created` lifecycle event carrying an item snapshot
    pub fn created(item: ItemSnapshot, sequence: u64) -> Self {
        let mut ev = Self::bare("response.output_item.created", sequence);
        ev.item = Some(item);
        ev
    }

    /// An `added` lifecycle event carrying an item snapshot
    pub fn added(item: ItemSnapshot, sequence: u64) -> Self {
        let mut ev = Self::bare("response.output_item.added", sequence);
        ev.item = Some(item);
        ev
    }

    /// A `done` lifecycle event carrying the final item snapshot
    pub fn done(item: ItemSnapshot, sequence: u64) -> Self {
        let mut ev = Self::bare("response.output_item.done", sequence);
        ev.item = Some(item);
        ev
    }

    /// A `done` lifecycle event addressed by item id only
    pub fn done_by_id(item_id: impl Into<String>, sequence: u64) -> Self {
        let mut ev = Self::bare("response.output_item.done", sequence);
        ev.item_id = Some(item_id.into());
        ev
    }

    /// A `failed` lifecycle event with an error detail
    pub fn failed(item_id: impl Into<String>, sequence: u64, error: ErrorDetail) -> Self {
        let mut ev = Self::bare("response.output_item.failed", sequence);
        ev.item_id = Some(item_id.into());
        ev.error = Some(error);
        ev
    }

    /// A text delta fragment for an in-flight item
    pub fn text_delta(item_id: impl Into<String>, sequence: u64, delta: impl Into<String>) -> Self {
        let mut ev = Self::bare("response.output_text.delta", sequence);
        ev.item_id = Some(item_id.into());
        ev.delta = Some(serde_json::Value::String(delta.into()));
        ev
    }

    /// A reasoning summary delta fragment for one indexed part
    pub fn reasoning_delta(
        item_id: impl Into<String>,
        sequence: u64,
        summary_index: usize,
        delta: impl Into<String>,
    ) -> Self {
        let mut ev = Self::bare("response.reasoning_summary_text.delta", sequence);
        ev.item_id = Some(item_id.into());
        ev.summary_index = Some(summary_index);
        ev.delta = Some(serde_json::Value::String(delta.into()));
        ev
    }

    /// A reasoning summary part slot opening
    pub fn summary_part_added(
        item_id: impl Into<String>,
        sequence: u64,
        summary_index: usize,
    ) -> Self {
        let mut ev = Self::bare("response.reasoning_summary_part.added", sequence);
        ev.item_id = Some(item_id.into());
        ev.summary_index = Some(summary_index);
        ev
    }

    /// A reasoning summary part finalization with its full text
    pub fn summary_part_done(
        item_id: impl Into<String>,
        sequence: u64,
        summary_index: usize,
        text: impl Into<String>,
    ) -> Self {
        let mut ev = Self::bare("response.reasoning_summary_part.done", sequence);
        ev.item_id = Some(item_id.into());
        ev.summary_index = Some(summary_index);
        ev.text = Some(text.into());
        ev
    }

    /// A top-level error event
    pub fn error(sequence: u64, error: ErrorDetail) -> Self {
        let mut ev = Self::bare("error", sequence);
        ev.error = Some(error);
        ev
    }

    /// Attach a timestamp
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Attach a complete final text
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Decode an event from an already-parsed JSON value
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Decode an event from raw JSON bytes
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Resolve this event's processing category.
    ///
    /// Resolution order matters: `reasoning_summary_text.delta` is a delta,
    /// not a lifecycle event, and `reasoning_summary_part.added` is a summary
    /// part, not an item `added`.
    pub fn classify(&self) -> EventClass {
        let t = self.event_type.as_str();
        if t == "error" {
            return EventClass::Error;
        }
        if t.contains("delta") {
            let kind = if t.contains("reasoning") {
                DeltaKind::Reasoning
            } else {
                DeltaKind::Text
            };
            return EventClass::Delta(kind);
        }
        if t.contains("summary_part") {
            if t.contains("added") {
                return EventClass::SummaryPart(SummaryPhase::Added);
            }
            if t.contains("done") || t.contains("completed") {
                return EventClass::SummaryPart(SummaryPhase::Done);
            }
        }
        if t.contains("created") {
            return EventClass::Lifecycle(LifecyclePhase::Created);
        }
        if t.contains("added") {
            return EventClass::Lifecycle(LifecyclePhase::Added);
        }
        if t.contains("done") || t.contains("completed") {
            return EventClass::Lifecycle(LifecyclePhase::Done);
        }
        if t.contains("failed") {
            return EventClass::Lifecycle(LifecyclePhase::Failed);
        }
        EventClass::Unknown
    }

    /// The item id this event addresses, from either the explicit field or
    /// the embedded snapshot
    pub fn item_id(&self) -> Option<&str> {
        self.item_id
            .as_deref()
            .or_else(|| self.item.as_ref().map(|i| i.id.as_str()))
    }

    /// The delta fragment, if present and well-formed (a non-empty string)
    pub fn delta_fragment(&self) -> Option<&str> {
        match &self.delta {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    /// Idempotency key: `(type, item id, sequence number)`
    pub fn key(&self) -> EventKey {
        EventKey {
            event_type: self.event_type.clone(),
            item_id: self.item_id().map(str::to_string),
            sequence: self.sequence_number,
        }
    }
}
