//! Scan cursor (spec §4.G): the pull-based iterator that drives the merge planner's tasks
//! through the merge queue and polygon engine, clips each polygon to the query's
//! valid-time window, and applies any remaining row predicate.

use crate::engine::core::iid::Iid;
use crate::engine::core::merge::planner::MergeTask;
use crate::engine::core::merge::queue::MergeQueue;
use crate::engine::core::polygon::PolygonEngine;
use serde_json::Value;

/// One fully-resolved, temporally-clipped row, ready for projection.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub iid: Iid,
    pub valid_from: i64,
    pub valid_to: i64,
    pub system_from: i64,
    pub system_to: Option<i64>,
    pub doc: Option<Value>,
}

/// A predicate evaluated after temporal clipping; expression evaluation itself is out of
/// scope (SPEC_FULL.md Non-goals) but the seam is needed so pushdown has somewhere to
/// plug in.
pub trait RowPredicate: Send + Sync {
    fn matches(&self, batch: &Batch) -> bool;
}

pub struct ScanCursor {
    tasks: std::vec::IntoIter<MergeTask>,
    current_queue: Option<MergeQueue>,
    engine: PolygonEngine,
    system_range: (i64, i64),
    system_point: Option<i64>,
    valid_range: (i64, i64),
    predicate: Option<Box<dyn RowPredicate>>,
}

impl ScanCursor {
    /// `system_point`, when set (an `AT` clause or the no-clause `AS OF` default — see
    /// [`crate::engine::core::temporal::TemporalBounds`]), keeps only the polygon piece
    /// current as of that instant instead of every piece whose `system_from` falls in
    /// `system_range`.
    pub fn new(
        tasks: Vec<MergeTask>,
        system_range: (i64, i64),
        system_point: Option<i64>,
        valid_range: (i64, i64),
        predicate: Option<Box<dyn RowPredicate>>,
    ) -> Self {
        Self {
            tasks: tasks.into_iter(),
            current_queue: None,
            engine: PolygonEngine::new(),
            system_range,
            system_point,
            valid_range,
            predicate,
        }
    }

    /// Pulls the next matching row, or `None` once every task is exhausted.
    pub fn advance(&mut self) -> Option<Batch> {
        loop {
            if self.current_queue.is_none() {
                let task = self.tasks.next()?;
                let mut queue = MergeQueue::new();
                for ptr in task.pointers {
                    queue.add_pointer(ptr);
                }
                self.current_queue = Some(queue);
                self.engine = PolygonEngine::new();
            }

            let idx = {
                let queue = self.current_queue.as_mut().unwrap();
                match queue.pop() {
                    Some(idx) => idx,
                    None => {
                        self.current_queue = None;
                        continue;
                    }
                }
            };

            let queue = self.current_queue.as_mut().unwrap();
            let event = queue.pointer(idx).current().unwrap().clone();
            let polygons = self.engine.process(&event, self.system_range);
            queue.reinsert_after_advance(idx);

            for polygon in polygons {
                if polygon.valid_to <= self.valid_range.0 || polygon.valid_from >= self.valid_range.1 {
                    continue;
                }
                if let Some(t) = self.system_point {
                    let superseded_before_point = polygon.system_to.is_some_and(|st| st <= t);
                    if polygon.system_from > t || superseded_before_point {
                        continue;
                    }
                }
                let batch = Batch {
                    iid: event.iid,
                    valid_from: polygon.valid_from.max(self.valid_range.0),
                    valid_to: polygon.valid_to.min(self.valid_range.1),
                    system_from: polygon.system_from,
                    system_to: polygon.system_to,
                    doc: event.document().cloned(),
                };
                if let Some(predicate) = &self.predicate {
                    if !predicate.matches(&batch) {
                        continue;
                    }
                }
                return Some(batch);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::core::event::{Event, Op};
    use crate::engine::core::iid::IdValue;
    use crate::engine::core::merge::pointer::{EventRowPointer, Source};
    use serde_json::json;

    fn put(id: &str, system_from: i64, vf: i64, vt: i64) -> Event {
        Event::new(
            Iid::from_id_value(&IdValue::Str(id.to_string())),
            system_from,
            Op::Put {
                doc: json!({"id": id}),
                valid_from: vf,
                valid_to: Some(vt),
            },
        )
    }

    #[test]
    fn yields_one_batch_per_live_polygon() {
        let task = MergeTask {
            path: vec![],
            pointers: vec![EventRowPointer::new(
                vec![put("a", 100, 10, 20)],
                Source::Live,
            )],
        };
        let mut cursor = ScanCursor::new(vec![task], (0, 1000), None, (0, 1000), None);
        let batch = cursor.advance().unwrap();
        assert_eq!(batch.valid_from, 10);
        assert_eq!(batch.valid_to, 20);
        assert_eq!(batch.system_to, None);
        assert!(cursor.advance().is_none());
    }

    #[test]
    fn clips_polygon_to_valid_range() {
        let task = MergeTask {
            path: vec![],
            pointers: vec![EventRowPointer::new(
                vec![put("a", 100, 0, 100)],
                Source::Live,
            )],
        };
        let mut cursor = ScanCursor::new(vec![task], (0, 1000), None, (40, 60), None);
        let batch = cursor.advance().unwrap();
        assert_eq!(batch.valid_from, 40);
        assert_eq!(batch.valid_to, 60);
    }

    struct EvenSystemFrom;
    impl RowPredicate for EvenSystemFrom {
        fn matches(&self, batch: &Batch) -> bool {
            batch.system_from % 2 == 0
        }
    }

    #[test]
    fn applies_row_predicate_after_clipping() {
        let task = MergeTask {
            path: vec![],
            pointers: vec![EventRowPointer::new(
                vec![put("a", 101, 0, 10)],
                Source::Live,
            )],
        };
        let mut cursor = ScanCursor::new(vec![task], (0, 1000), None, (0, 1000), Some(Box::new(EvenSystemFrom)));
        assert!(cursor.advance().is_none());
    }

    #[test]
    fn system_point_keeps_only_the_row_current_at_that_instant() {
        // Two revisions of the same entity, processed newest-first: the queue delivers
        // system_from=200 before system_from=100.
        let task = MergeTask {
            path: vec![],
            pointers: vec![EventRowPointer::new(
                vec![put("a", 200, 10, 20), put("a", 100, 10, 20)],
                Source::Live,
            )],
        };
        // Querying far past both revisions with no system_point returns both pieces.
        let mut unfiltered = ScanCursor::new(
            vec![MergeTask {
                path: vec![],
                pointers: vec![EventRowPointer::new(
                    vec![put("a", 200, 10, 20), put("a", 100, 10, 20)],
                    Source::Live,
                )],
            }],
            (0, 1000),
            None,
            (0, 1000),
            None,
        );
        let mut all_pieces = Vec::new();
        while let Some(b) = unfiltered.advance() {
            all_pieces.push(b);
        }
        assert_eq!(all_pieces.len(), 2);

        // system_point=150 lies between the two revisions: only the system_from=100 piece
        // (current at that instant, superseded at 200) should survive.
        let mut cursor = ScanCursor::new(vec![task], (0, 1000), Some(150), (0, 1000), None);
        let batch = cursor.advance().unwrap();
        assert_eq!(batch.system_from, 100);
        assert_eq!(batch.system_to, Some(200));
        assert!(cursor.advance().is_none());
    }
}
