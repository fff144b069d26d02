//! Watermarks (spec §3/§5): a pinned, consistent view of a table's current segment set
//! plus a snapshot of the live index's contents, held for the duration of one query so
//! concurrent flushes/compactions can't mutate what the query is reading.

use crate::engine::core::event::Event;
use crate::engine::core::segment::naming::SegmentId;
use crate::engine::errors::CoreError;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// A single pinned view. Dropping it releases the pin (decrements the refcount the
/// watermark registry uses to know which segment generations are still in use).
pub struct Watermark {
    pub segments: Vec<SegmentId>,
    pub live_snapshot: Vec<(Vec<u8>, Vec<Event>)>,
    registry: Arc<Mutex<WatermarkRegistry>>,
    generation: u64,
}

impl Drop for Watermark {
    fn drop(&mut self) {
        self.registry.lock().release(self.generation);
    }
}

#[derive(Default)]
struct WatermarkRegistry {
    pins: std::collections::HashMap<u64, u64>,
}

impl WatermarkRegistry {
    fn pin(&mut self, generation: u64) {
        *self.pins.entry(generation).or_insert(0) += 1;
    }

    fn release(&mut self, generation: u64) {
        if let Some(count) = self.pins.get_mut(&generation) {
            *count -= 1;
            if *count == 0 {
                self.pins.remove(&generation);
            }
        }
    }

    /// The oldest generation still pinned by a live query, if any; a compactor must not
    /// delete segment files from this generation or newer.
    fn oldest_pinned(&self) -> Option<u64> {
        self.pins.keys().min().copied()
    }
}

/// Tracks the table's current segment set and hands out pinned [`Watermark`]s.
pub struct WatermarkTable {
    registry: Arc<Mutex<WatermarkRegistry>>,
    generation: Mutex<u64>,
    current: Mutex<(Vec<SegmentId>, u64)>,
}

impl WatermarkTable {
    pub fn new(segments: Vec<SegmentId>) -> Self {
        Self {
            registry: Arc::new(Mutex::new(WatermarkRegistry::default())),
            generation: Mutex::new(0),
            current: Mutex::new((segments, 0)),
        }
    }

    /// Publishes a new segment set (after a flush or compaction), bumping the generation.
    pub fn publish(&self, segments: Vec<SegmentId>) {
        let mut gen = self.generation.lock();
        *gen += 1;
        *self.current.lock() = (segments, *gen);
    }

    /// Pins the current segment set plus a live-index snapshot for the query's lifetime.
    pub fn pin(&self, live_snapshot: Vec<(Vec<u8>, Vec<Event>)>) -> Watermark {
        let (segments, generation) = self.current.lock().clone();
        self.registry.lock().pin(generation);
        Watermark {
            segments,
            live_snapshot,
            registry: self.registry.clone(),
            generation,
        }
    }

    /// The oldest generation any live query still holds; segment files superseded before
    /// this generation are safe to delete.
    pub fn oldest_pinned_generation(&self) -> Option<u64> {
        self.registry.lock().oldest_pinned()
    }
}

/// Publishes the most recently committed transaction's system-time so a query's `after-tx`
/// wait (spec §5's "awaiting the indexer to catch up") can suspend on it instead of polling.
/// The indexer owns the sender; cursors hold cloned receivers.
pub struct TxWatermark {
    tx: watch::Sender<i64>,
}

impl TxWatermark {
    pub fn new(initial: i64) -> Self {
        Self {
            tx: watch::Sender::new(initial),
        }
    }

    /// Called by the indexer after a transaction commits.
    pub fn advance(&self, committed_tx: i64) {
        self.tx.send_if_modified(|current| {
            if committed_tx > *current {
                *current = committed_tx;
                true
            } else {
                false
            }
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<i64> {
        self.tx.subscribe()
    }

    /// Suspends until `after_tx` has been committed, or fails with [`CoreError::Timeout`]
    /// once `timeout` elapses. A cursor calls this before pinning a watermark so it only
    /// ever sees segment sets/live-index state at least as fresh as `after_tx`.
    pub async fn wait_for(
        rx: &mut watch::Receiver<i64>,
        after_tx: i64,
        timeout: Duration,
    ) -> Result<(), CoreError> {
        if *rx.borrow() >= after_tx {
            return Ok(());
        }
        tokio::time::timeout(timeout, rx.wait_for(|tx| *tx >= after_tx))
            .await
            .map_err(|_| CoreError::Timeout)?
            .map_err(|_| CoreError::Timeout)?;
        Ok(())
    }
}
