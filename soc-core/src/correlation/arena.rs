use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Opaque handle into an `EventArena`; partition windows hold these
/// instead of event data directly, avoiding the back-reference cycles a
/// naive linked sliding window would create (spec §9 REDESIGN FLAGS).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArenaIdx(usize);

struct Slot {
    event_query_id: String,
    timestamp: DateTime<Utc>,
    doc_id: String,
    refs: u32,
}

/// Owns event records by arena index; per-partition sliding windows hold
/// `ArenaIdx`es and release them as they slide out of window, at which
/// point the arena frees the slot once its reference count drops to zero.
#[derive(Default)]
pub struct EventArena {
    slots: Vec<Option<Slot>>,
    free_list: Vec<usize>,
    by_doc_id: HashMap<String, ArenaIdx>,
}

impl EventArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, event_query_id: &str, timestamp: DateTime<Utc>, doc_id: &str) -> ArenaIdx {
        if let Some(&idx) = self.by_doc_id.get(doc_id) {
            if let Some(slot) = &mut self.slots[idx.0] {
                slot.refs += 1;
            }
            return idx;
        }
        let slot = Slot { event_query_id: event_query_id.to_string(), timestamp, doc_id: doc_id.to_string(), refs: 1 };
        let idx = if let Some(free) = self.free_list.pop() {
            self.slots[free] = Some(slot);
            free
        } else {
            self.slots.push(Some(slot));
            self.slots.len() - 1
        };
        let handle = ArenaIdx(idx);
        self.by_doc_id.insert(doc_id.to_string(), handle);
        handle
    }

    pub fn get(&self, idx: ArenaIdx) -> Option<(&str, DateTime<Utc>, &str)> {
        self.slots[idx.0].as_ref().map(|s| (s.event_query_id.as_str(), s.timestamp, s.doc_id.as_str()))
    }

    /// Releases one reference; frees the slot when the last window holding
    /// it evicts it.
    pub fn release(&mut self, idx: ArenaIdx) {
        if let Some(slot) = &mut self.slots[idx.0] {
            slot.refs = slot.refs.saturating_sub(1);
            if slot.refs == 0 {
                let doc_id = slot.doc_id.clone();
                self.slots[idx.0] = None;
                self.free_list.push(idx.0);
                self.by_doc_id.remove(&doc_id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.by_doc_id.len()
    }
}
