//! braid-events: conversation event model and delta reconstruction
//!
//! This crate provides the typed representations of the two event
//! vocabularies a conversation view consumes (discrete lifecycle events and
//! incremental delta events), the unified conversation-item model, and the
//! buffer that reassembles out-of-order text fragments.

pub mod delta;
pub mod error;
pub mod event;
pub mod item;

pub use delta::{DeltaBuffer, DeltaSlot};
pub use error::{Error, Result};
pub use event::{DeltaKind, EventClass, EventKey, LifecyclePhase, RawEvent, SummaryPhase};
pub use item::{
    ConversationItem, ErrorDetail, ErrorSource, ItemKind, ItemPayload, ItemSnapshot, ItemStatus,
    Role, ToolDescriptor, parse_timestamp,
};
