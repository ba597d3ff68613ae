//! braid-store: conversation merging and reactive publication
//!
//! This crate combines a durable conversation snapshot with a live
//! streaming-event overlay into one stable, ordered item list, and
//! publishes it through a push-based subscription with late-join replay.

pub mod error;
pub mod handle;
pub mod merge;
pub mod store;
pub mod tracker;

pub use error::{Error, Result};
pub use handle::StoreHandle;
pub use merge::{merge, overlay};
pub use store::{
    ArchiveMetadata, ConversationSnapshot, ConversationStore, SessionArchive, SessionState,
};
pub use tracker::ItemTracker;
