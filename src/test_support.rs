//! Shared fixtures for integration-style tests that exercise more than one module of the
//! bitemporal core together.

use crate::engine::core::event::{Event, Op};
use crate::engine::core::iid::{IdValue, Iid};
use serde_json::{json, Value};

pub fn iid_for(raw: &str) -> Iid {
    Iid::from_id_value(&IdValue::Str(raw.to_string()))
}

pub fn put_event(id: &str, system_from: i64, valid_from: i64, valid_to: Option<i64>, doc: Value) -> Event {
    Event::new(
        iid_for(id),
        system_from,
        Op::Put {
            doc,
            valid_from,
            valid_to,
        },
    )
}

pub fn delete_event(id: &str, system_from: i64, valid_from: i64, valid_to: Option<i64>) -> Event {
    Event::new(
        iid_for(id),
        system_from,
        Op::Delete {
            valid_from,
            valid_to,
        },
    )
}

pub fn erase_event(id: &str, system_from: i64) -> Event {
    Event::new(iid_for(id), system_from, Op::Erase)
}

pub fn sample_doc(id: &str) -> Value {
    json!({"xt$id": id, "name": id})
}
