//! Out-of-order fragment accumulation
//!
//! Transports may redeliver or reorder delta fragments; reconstruction must
//! order by the source-assigned sequence number, never by arrival order.

use std::collections::{BTreeMap, HashMap};

/// Addresses one reconstruction channel of one item.
///
/// Message text uses the content channel; each indexed reasoning summary
/// part reconstructs independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeltaSlot {
    pub item_id: String,
    pub summary_index: Option<usize>,
}

impl DeltaSlot {
    /// The main content channel of an item
    pub fn content(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            summary_index: None,
        }
    }

    /// One indexed reasoning summary part of an item
    pub fn summary(item_id: impl Into<String>, index: usize) -> Self {
        Self {
            item_id: item_id.into(),
            summary_index: Some(index),
        }
    }
}

/// Per-slot fragment buffer keyed by sequence number.
///
/// Slots must be cleared when the owning item reaches a terminal state;
/// fragments are useless afterwards and a long streaming session would
/// otherwise grow the buffer without bound.
#[derive(Debug, Default)]
pub struct DeltaBuffer {
    slots: HashMap<DeltaSlot, BTreeMap<u64, String>>,
}

impl DeltaBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a fragment. A redelivery at the same sequence number overwrites
    /// the earlier copy.
    pub fn insert(&mut self, slot: DeltaSlot, sequence: u64, fragment: impl Into<String>) {
        let fragments = self.slots.entry(slot).or_default();
        if fragments.insert(sequence, fragment.into()).is_some() {
            tracing::debug!(sequence, "fragment redelivered, keeping latest copy");
        }
    }

    /// Reconstruct the slot's text: fragments in ascending sequence order,
    /// concatenated with no separator.
    pub fn reconstruct(&self, slot: &DeltaSlot) -> String {
        match self.slots.get(slot) {
            Some(fragments) => fragments.values().map(String::as_str).collect(),
            None => String::new(),
        }
    }

    /// Drop every slot belonging to an item
    pub fn clear_item(&mut self, item_id: &str) {
        self.slots.retain(|slot, _| slot.item_id != item_id);
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Number of live slots
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconstruct_orders_by_sequence_not_arrival() {
        let mut buf = DeltaBuffer::new();
        let slot = DeltaSlot::content("m1");
        // Delivered [2, 0, 1]; correct text follows the sequence numbers
        buf.insert(slot.clone(), 2, "lo");
        buf.insert(slot.clone(), 0, "he");
        buf.insert(slot.clone(), 1, "l");
        assert_eq!(buf.reconstruct(&slot), "hello");
    }

    #[test]
    fn test_reconstruct_invariant_under_every_delivery_order() {
        let fragments = [(0u64, "he"), (1, "l"), (2, "lo")];
        let permutations = [
            [0usize, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        for perm in permutations {
            let mut buf = DeltaBuffer::new();
            let slot = DeltaSlot::content("m1");
            for &i in &perm {
                let (seq, frag) = fragments[i];
                buf.insert(slot.clone(), seq, frag);
            }
            assert_eq!(buf.reconstruct(&slot), "hello", "delivery order {:?}", perm);
        }
    }

    #[test]
    fn test_redelivery_overwrites_same_sequence() {
        let mut buf = DeltaBuffer::new();
        let slot = DeltaSlot::content("m1");
        buf.insert(slot.clone(), 0, "first");
        buf.insert(slot.clone(), 0, "second");
        assert_eq!(buf.reconstruct(&slot), "second");
    }

    #[test]
    fn test_summary_slots_are_independent() {
        let mut buf = DeltaBuffer::new();
        buf.insert(DeltaSlot::summary("r1", 0), 0, "part zero");
        buf.insert(DeltaSlot::summary("r1", 1), 0, "part one");
        buf.insert(DeltaSlot::content("r1"), 0, "content");
        assert_eq!(buf.reconstruct(&DeltaSlot::summary("r1", 0)), "part zero");
        assert_eq!(buf.reconstruct(&DeltaSlot::summary("r1", 1)), "part one");
        assert_eq!(buf.reconstruct(&DeltaSlot::content("r1")), "content");
    }

    #[test]
    fn test_clear_item_drops_all_slots_of_item() {
        let mut buf = DeltaBuffer::new();
        buf.insert(DeltaSlot::content("r1"), 0, "a");
        buf.insert(DeltaSlot::summary("r1", 0), 1, "b");
        buf.insert(DeltaSlot::content("other"), 0, "keep");
        buf.clear_item("r1");
        assert_eq!(buf.reconstruct(&DeltaSlot::content("r1")), "");
        assert_eq!(buf.reconstruct(&DeltaSlot::summary("r1", 0)), "");
        assert_eq!(buf.reconstruct(&DeltaSlot::content("other")), "keep");
        assert_eq!(buf.slot_count(), 1);
    }

    #[test]
    fn test_unknown_slot_reconstructs_empty() {
        let buf = DeltaBuffer::new();
        assert_eq!(buf.reconstruct(&DeltaSlot::content("nope")), "");
        assert!(buf.is_empty());
    }
}
