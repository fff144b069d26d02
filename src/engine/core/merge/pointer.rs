//! Event-row pointers (spec §4.E): a cursor over one leaf's rows, positioned at
//! construction to the rows that matched the merge planner's trie path, so the merge
//! queue can advance it without re-deciding which rows belong to the task.

use crate::engine::core::event::Event;
use crate::engine::core::iid::Iid;

/// Where a pointer's rows came from, kept only for diagnostics — the merge queue treats
/// every pointer identically regardless of provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Segment { level: u32 },
    Live,
}

/// A cursor over one leaf's rows, already restricted to a single trie path and ordered
/// `(iid asc, system_from desc)`.
pub struct EventRowPointer {
    rows: Vec<Event>,
    pos: usize,
    source: Source,
}

impl EventRowPointer {
    pub fn new(rows: Vec<Event>, source: Source) -> Self {
        Self {
            rows,
            pos: 0,
            source,
        }
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn current(&self) -> Option<&Event> {
        self.rows.get(self.pos)
    }

    pub fn iid(&self) -> Option<Iid> {
        self.current().map(|e| e.iid)
    }

    pub fn system_from(&self) -> Option<i64> {
        self.current().map(|e| e.system_from)
    }

    pub fn advance(&mut self) {
        self.pos += 1;
    }

    pub fn valid(&self) -> bool {
        self.pos < self.rows.len()
    }
}
