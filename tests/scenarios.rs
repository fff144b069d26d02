//! End-to-end scenarios (spec §8, S1-S6) driving the full read path: merge planner,
//! merge queue, polygon engine, and scan cursor together, against both the live index
//! alone and real on-disk segments.

use bitemporal_store::engine::core::event::{Event, Op};
use bitemporal_store::engine::core::iid::{IdValue, Iid};
use bitemporal_store::engine::core::live_index::LIVE_INDEX_DEPTH;
use bitemporal_store::engine::core::merge::planner::plan_merge_tasks;
use bitemporal_store::engine::core::merge::scan::{Batch, ScanCursor};
use bitemporal_store::engine::core::segment::naming::table_dir;
use bitemporal_store::engine::core::segment::reader::SegmentReader;
use bitemporal_store::engine::core::segment::writer::write_segment;
use bitemporal_store::engine::core::compactor::compact_all;
use serde_json::{json, Value};
use tempfile::tempdir;

fn iid(raw: &str) -> Iid {
    Iid::from_id_value(&IdValue::Str(raw.to_string()))
}

fn put(id: &str, system_from: i64, valid_from: i64, valid_to: Option<i64>, doc: Value) -> Event {
    Event::new(
        iid(id),
        system_from,
        Op::Put {
            doc,
            valid_from,
            valid_to,
        },
    )
}

fn delete(id: &str, system_from: i64, valid_from: i64, valid_to: Option<i64>) -> Event {
    Event::new(
        iid(id),
        system_from,
        Op::Delete {
            valid_from,
            valid_to,
        },
    )
}

fn erase(id: &str, system_from: i64) -> Event {
    Event::new(iid(id), system_from, Op::Erase)
}

/// Buckets `events` the way a live index would: grouped by the depth-8 nibble prefix,
/// each bucket sorted `(iid asc, system_from desc)` to match a disk data page.
fn live_buckets(mut events: Vec<Event>) -> Vec<(Vec<u8>, Vec<Event>)> {
    events.sort_by(|a, b| a.iid.cmp(&b.iid).then(b.system_from.cmp(&a.system_from)));
    let mut buckets: Vec<(Vec<u8>, Vec<Event>)> = Vec::new();
    for event in events {
        let path: Vec<u8> = event.iid.nibbles().take(LIVE_INDEX_DEPTH).collect();
        match buckets.iter_mut().find(|(p, _)| *p == path) {
            Some((_, rows)) => rows.push(event),
            None => buckets.push((path, vec![event])),
        }
    }
    buckets
}

/// Runs a query with no `system_point` (a window/audit query: every polygon piece whose
/// `system_from` lands in `system_range` is a valid answer).
fn run_query(
    segments: &[SegmentReader],
    buckets: &[(Vec<u8>, Vec<Event>)],
    system_range: (i64, i64),
    valid_range: (i64, i64),
) -> Vec<Batch> {
    run_query_as_of(segments, buckets, system_range, None, valid_range)
}

/// Runs a query pinned to a single system-time instant (`AS OF`/default-clause
/// semantics): the gate sees all history up to `system_range.1`, but only the polygon
/// piece current at `system_point` survives.
fn run_query_as_of(
    segments: &[SegmentReader],
    buckets: &[(Vec<u8>, Vec<Event>)],
    system_range: (i64, i64),
    system_point: Option<i64>,
    valid_range: (i64, i64),
) -> Vec<Batch> {
    let tasks = plan_merge_tasks(segments, buckets, system_range).unwrap();
    let mut cursor = ScanCursor::new(tasks, system_range, system_point, valid_range, None);
    let mut out = Vec::new();
    while let Some(batch) = cursor.advance() {
        out.push(batch);
    }
    out.sort_by(|a, b| a.iid.cmp(&b.iid).then(a.valid_from.cmp(&b.valid_from)));
    out
}

#[test]
fn s1_point_in_time_as_of() {
    let events = vec![
        put("1", 100, 0, None, json!({"xt$id": "1", "name": "A"})),
        put("1", 200, 0, None, json!({"xt$id": "1", "name": "B"})),
    ];
    let buckets = live_buckets(events);

    let as_of_jan_15 = run_query_as_of(
        &[],
        &buckets,
        (i64::MIN, 150),
        Some(149),
        (i64::MIN, i64::MAX),
    );
    assert_eq!(as_of_jan_15.len(), 1);
    assert_eq!(as_of_jan_15[0].doc.as_ref().unwrap()["name"], json!("A"));

    let as_of_feb_15 = run_query_as_of(
        &[],
        &buckets,
        (i64::MIN, 250),
        Some(249),
        (i64::MIN, i64::MAX),
    );
    assert_eq!(as_of_feb_15.len(), 1);
    assert_eq!(as_of_feb_15[0].doc.as_ref().unwrap()["name"], json!("B"));
}

#[test]
fn s2_valid_time_range() {
    let events = vec![put(
        "o1",
        100,
        2024_01_01,
        Some(2024_06_01),
        json!({"xt$id": "o1", "qty": 5}),
    )];
    let buckets = live_buckets(events);

    let in_range = run_query(
        &[],
        &buckets,
        (i64::MIN, i64::MAX),
        (2024_03_01, 2024_03_02),
    );
    assert_eq!(in_range.len(), 1);
    assert_eq!(in_range[0].doc.as_ref().unwrap()["qty"], json!(5));

    let out_of_range = run_query(
        &[],
        &buckets,
        (i64::MIN, i64::MAX),
        (2024_07_01, 2024_07_02),
    );
    assert!(out_of_range.is_empty());
}

#[test]
fn s3_erase() {
    let events = vec![
        put("1", 100, 0, None, json!({"xt$id": "1", "v": 1})),
        erase("1", 200),
    ];
    let buckets = live_buckets(events);

    let all_time = run_query(&[], &buckets, (i64::MIN, i64::MAX), (i64::MIN, i64::MAX));
    assert!(all_time.is_empty());

    let before_erase = run_query(&[], &buckets, (i64::MIN, 150), (i64::MIN, i64::MAX));
    assert_eq!(before_erase.len(), 1);
    assert_eq!(before_erase[0].doc.as_ref().unwrap()["v"], json!(1));
}

#[test]
fn s4_delete_overlaps() {
    let events = vec![
        put("1", 100, 2020, Some(2024), json!({"xt$id": "1"})),
        delete("1", 200, 2022, Some(2023)),
    ];
    let buckets = live_buckets(events);

    let mut rows = run_query(&[], &buckets, (i64::MIN, i64::MAX), (i64::MIN, i64::MAX));
    rows.sort_by_key(|b| b.valid_from);
    assert_eq!(rows.len(), 2);
    assert_eq!((rows[0].valid_from, rows[0].valid_to), (2020, 2022));
    assert_eq!((rows[1].valid_from, rows[1].valid_to), (2023, 2024));
}

#[test]
fn s5_compaction_equivalence() {
    let dir = tempdir().unwrap();
    let table = "people";

    // Ten entities are revised once per segment (so compaction must correctly resolve
    // supersession across segment boundaries), plus filler entities unique to each
    // segment so every L0 segment still has its own rows.
    for segment_idx in 0..4u64 {
        let mut events = Vec::new();
        for entity in 0..10u64 {
            let id = format!("shared-{entity}");
            events.push(put(
                &id,
                segment_idx * 1000 + entity,
                0,
                None,
                json!({"xt$id": id, "rev": segment_idx}),
            ));
        }
        for filler in 0..15u64 {
            let id = format!("solo-{segment_idx}-{filler}");
            events.push(put(
                &id,
                segment_idx * 1000 + 500 + filler,
                0,
                None,
                json!({"xt$id": id}),
            ));
        }
        events.sort_by(|a, b| a.iid.cmp(&b.iid).then(b.system_from.cmp(&a.system_from)));
        write_segment(dir.path(), table, 0, segment_idx * 100, 16, &events, &[]).unwrap();
    }

    let before = query_all(dir.path(), table);
    let rounds = compact_all(dir.path(), table, 4, 16).unwrap();
    assert_eq!(rounds, 1);
    let after = query_all(dir.path(), table);

    assert_eq!(before, after);
    // The newest revision of each shared entity must still be the one with no successor.
    let current: Vec<&Batch> = after
        .iter()
        .filter(|b| b.system_to.is_none())
        .filter(|b| b.doc.as_ref().unwrap()["xt$id"].as_str().unwrap().starts_with("shared-"))
        .collect();
    assert_eq!(current.len(), 10);
    for batch in current {
        assert_eq!(batch.doc.as_ref().unwrap()["rev"], json!(3));
    }
}

fn query_all(data_dir: &std::path::Path, table: &str) -> Vec<Batch> {
    let dir = table_dir(data_dir, table);
    let meta_dir = dir.join("meta");
    let mut segment_ids = Vec::new();
    for entry in std::fs::read_dir(&meta_dir).unwrap() {
        let entry = entry.unwrap();
        if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
            if let Ok(id) =
                bitemporal_store::engine::core::segment::naming::SegmentId::parse(stem)
            {
                segment_ids.push(id);
            }
        }
    }
    let readers: Vec<SegmentReader> = segment_ids
        .into_iter()
        .map(|id| SegmentReader::open(&dir, id).unwrap())
        .collect();

    let mut rows = run_query(&readers, &[], (i64::MIN, i64::MAX), (i64::MIN, i64::MAX));
    rows.sort_by(|a, b| {
        a.doc
            .as_ref()
            .unwrap()["xt$id"]
            .as_str()
            .cmp(&b.doc.as_ref().unwrap()["xt$id"].as_str())
            .then(a.system_from.cmp(&b.system_from))
    });
    rows
}

#[test]
fn s6_pushdown_correctness() {
    let dir = tempdir().unwrap();
    let table = "docs";
    let mut events = Vec::new();
    for entity in 0..10u64 {
        events.push(put(
            &format!("d{entity}"),
            entity as i64,
            0,
            None,
            json!({"xt$id": format!("d{entity}")}),
        ));
    }
    events.sort_by(|a, b| a.iid.cmp(&b.iid).then(b.system_from.cmp(&a.system_from)));
    write_segment(dir.path(), table, 0, 0, 64, &events, &[]).unwrap();

    let segment_dir = table_dir(dir.path(), table);
    let id = bitemporal_store::engine::core::segment::naming::SegmentId {
        level: 0,
        first_row: 0,
        next_row: 10,
    };
    let reader = SegmentReader::open(&segment_dir, id).unwrap();

    // A system_range entirely above every row's system_from (0..=9) must prune every leaf
    // before plan_merge_tasks ever calls read_page, so the resulting task set is empty.
    let tasks = plan_merge_tasks(&[reader], &[], (1000, 2000)).unwrap();
    assert!(tasks.iter().all(|t| t.pointers.is_empty()) || tasks.is_empty());
}
