//! The unit of bitemporal history: one row keyed by `(iid, system_from)`, carrying either
//! a document revision, a valid-time delete, or an erase tombstone (spec §2/§4.D).

use crate::engine::core::iid::Iid;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What happened to an entity at a given system-time instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// A document revision becomes visible over `[valid_from, valid_to)`.
    Put {
        doc: Value,
        valid_from: i64,
        valid_to: Option<i64>,
    },
    /// The entity is deleted over `[valid_from, valid_to)`; no document is visible there.
    Delete {
        valid_from: i64,
        valid_to: Option<i64>,
    },
    /// Erases all history for this entity, at every valid-time, as of this system-time.
    /// Per §4.D's skip-iid rule, an erase suppresses every row for the entity at and
    /// before its system-time, not just the rows already on disk.
    Erase,
}

/// One event row: an `Op` pinned to an entity and a system-time instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub iid: Iid,
    pub system_from: i64,
    pub op: Op,
}

impl Event {
    pub fn new(iid: Iid, system_from: i64, op: Op) -> Self {
        Self {
            iid,
            system_from,
            op,
        }
    }

    /// Valid-time range this event asserts, if it asserts one at all (`Erase` does not).
    pub fn valid_range(&self) -> Option<(i64, Option<i64>)> {
        match &self.op {
            Op::Put {
                valid_from,
                valid_to,
                ..
            } => Some((*valid_from, *valid_to)),
            Op::Delete {
                valid_from,
                valid_to,
            } => Some((*valid_from, *valid_to)),
            Op::Erase => None,
        }
    }

    pub fn is_erase(&self) -> bool {
        matches!(self.op, Op::Erase)
    }

    pub fn is_delete(&self) -> bool {
        matches!(self.op, Op::Delete { .. })
    }

    pub fn document(&self) -> Option<&Value> {
        match &self.op {
            Op::Put { doc, .. } => Some(doc),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::core::iid::IdValue;
    use serde_json::json;

    fn iid() -> Iid {
        Iid::from_id_value(&IdValue::Str("e1".into()))
    }

    #[test]
    fn put_exposes_valid_range_and_document() {
        let e = Event::new(
            iid(),
            100,
            Op::Put {
                doc: json!({"a": 1}),
                valid_from: 10,
                valid_to: Some(20),
            },
        );
        assert_eq!(e.valid_range(), Some((10, Some(20))));
        assert_eq!(e.document(), Some(&json!({"a": 1})));
        assert!(!e.is_delete());
        assert!(!e.is_erase());
    }

    #[test]
    fn delete_has_no_document() {
        let e = Event::new(
            iid(),
            100,
            Op::Delete {
                valid_from: 10,
                valid_to: None,
            },
        );
        assert!(e.is_delete());
        assert_eq!(e.document(), None);
        assert_eq!(e.valid_range(), Some((10, None)));
    }

    #[test]
    fn erase_has_no_valid_range() {
        let e = Event::new(iid(), 100, Op::Erase);
        assert!(e.is_erase());
        assert_eq!(e.valid_range(), None);
    }
}
