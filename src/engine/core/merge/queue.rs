//! Merge queue (spec §4.E): a min-heap over every leaf's current row, ordered `(iid asc,
//! system_from desc)` so the scan cursor always polls the row the polygon engine (§4.D)
//! needs next. Pointers are index-addressed in a `Vec` (not reallocated on reinsert) per
//! the "heap of pointers" design note in SPEC_FULL.md §9.

use crate::engine::core::iid::Iid;
use crate::engine::core::merge::pointer::EventRowPointer;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

struct QueueEntry {
    iid: Iid,
    system_from: i64,
    ptr_idx: usize,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.iid == other.iid && self.system_from == other.system_from
    }
}
impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse on iid so the smallest iid is "greatest" (pops
        // first), then prefer the larger system_from on a tie so newest-first holds within
        // one entity.
        other.iid.cmp(&self.iid).then(self.system_from.cmp(&other.system_from))
    }
}
impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub struct MergeQueue {
    pointers: Vec<EventRowPointer>,
    heap: BinaryHeap<QueueEntry>,
}

impl MergeQueue {
    pub fn new() -> Self {
        Self {
            pointers: Vec::new(),
            heap: BinaryHeap::new(),
        }
    }

    /// Registers a pointer, pushing its current row onto the heap if it has one. Returns
    /// the pointer's stable index for later `reinsert_after_advance` calls.
    pub fn add_pointer(&mut self, ptr: EventRowPointer) -> usize {
        let idx = self.pointers.len();
        if let Some(event) = ptr.current() {
            self.heap.push(QueueEntry {
                iid: event.iid,
                system_from: event.system_from,
                ptr_idx: idx,
            });
        }
        self.pointers.push(ptr);
        idx
    }

    /// Pops the smallest `(iid, -system_from)` entry, returning its pointer index. The
    /// caller reads `self.pointer(idx).current()` before advancing.
    pub fn pop(&mut self) -> Option<usize> {
        self.heap.pop().map(|entry| entry.ptr_idx)
    }

    pub fn pointer(&self, idx: usize) -> &EventRowPointer {
        &self.pointers[idx]
    }

    /// Advances the pointer and, if it still has rows, pushes its new current row back
    /// onto the heap under the same index.
    pub fn reinsert_after_advance(&mut self, idx: usize) {
        self.pointers[idx].advance();
        if let Some(event) = self.pointers[idx].current() {
            self.heap.push(QueueEntry {
                iid: event.iid,
                system_from: event.system_from,
                ptr_idx: idx,
            });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl Default for MergeQueue {
    fn default() -> Self {
        Self::new()
    }
}
