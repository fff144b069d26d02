//! Live (in-memory) index (spec §4.C): a hash trie of unflushed events for the current
//! chunk, keyed by the same nibble-prefix path on-disk segments use, so a live leaf is
//! indistinguishable from an on-disk leaf to the merge queue apart from its source tag.

use crate::engine::core::event::Event;
use crate::engine::errors::CoreError;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Depth (in nibbles) at which the live trie partitions events into buckets. Disk tries
/// may be deeper after a flush; this only needs to be coarse enough to keep bucket
/// contention low under concurrent inserts.
pub const LIVE_INDEX_DEPTH: usize = 8;

/// One trie leaf's worth of unflushed events, sorted lazily on read.
#[derive(Debug, Default)]
pub struct Bucket {
    events: Vec<Event>,
    sorted: bool,
}

impl Bucket {
    fn push(&mut self, event: Event) {
        self.events.push(event);
        self.sorted = false;
    }

    /// Events ordered `(iid asc, system_from desc)`, matching a disk data page (property 1).
    pub fn sorted_events(&mut self) -> &[Event] {
        if !self.sorted {
            self.events
                .sort_by(|a, b| a.iid.cmp(&b.iid).then(b.system_from.cmp(&a.system_from)));
            self.sorted = true;
        }
        &self.events
    }
}

fn trie_path(event: &Event) -> Vec<u8> {
    event.iid.nibbles().take(LIVE_INDEX_DEPTH).collect()
}

/// The current chunk's in-memory buffer. A write latch (the `RwLock`'s write guard) is
/// held only for the duration of a single insert or the atomic flush; readers take a read
/// guard just long enough to clone the snapshot reference a watermark pins.
pub struct LiveIndex {
    buckets: RwLock<BTreeMap<Vec<u8>, Bucket>>,
    capacity: usize,
    count: RwLock<usize>,
}

impl LiveIndex {
    pub fn new(capacity: usize) -> Self {
        Self {
            buckets: RwLock::new(BTreeMap::new()),
            capacity,
            count: RwLock::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        *self.count.read()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Appends an event, validating the invariants §3 places on every row.
    pub fn insert(&self, event: Event) -> Result<(), CoreError> {
        if let Some((valid_from, Some(valid_to))) = event.valid_range() {
            if valid_from >= valid_to {
                return Err(CoreError::InvalidArgument(
                    "valid_from must be strictly less than valid_to".into(),
                ));
            }
        }

        let path = trie_path(&event);
        {
            let mut buckets = self.buckets.write();
            buckets.entry(path).or_default().push(event);
        }
        *self.count.write() += 1;
        Ok(())
    }

    /// Buckets keyed by trie path, each internally sorted by `(iid asc, system_from
    /// desc)`. Consumed by the merge planner (§4.F) as the live-trie's leaves.
    pub fn sorted_buckets(&self) -> Vec<(Vec<u8>, Vec<Event>)> {
        let mut buckets = self.buckets.write();
        buckets
            .iter_mut()
            .map(|(path, bucket)| (path.clone(), bucket.sorted_events().to_vec()))
            .collect()
    }

    /// Atomically transfers ownership of every event out, resetting the index. The
    /// caller uses the returned events to materialize a new L0 segment (§4.B).
    pub fn flush(&self) -> Vec<Event> {
        let mut buckets = self.buckets.write();
        let mut all: Vec<Event> = buckets
            .values_mut()
            .flat_map(|bucket| std::mem::take(&mut bucket.events))
            .collect();
        buckets.clear();
        *self.count.write() = 0;
        all.sort_by(|a, b| a.iid.cmp(&b.iid).then(b.system_from.cmp(&a.system_from)));
        all
    }
}
