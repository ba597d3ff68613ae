//! Error types for braid-store

use thiserror::Error;

/// Result type alias using braid-store Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur at the store's API boundary.
///
/// Data-quality problems inside the event stream are never errors; the
/// store degrades per-item and keeps rendering. These variants cover
/// caller mistakes only.
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the event model layer
    #[error(transparent)]
    Event(#[from] braid_events::Error),

    /// A status patch addressed an item id the conversation does not contain
    #[error("Unknown item id: {0}")]
    UnknownItem(String),
}
