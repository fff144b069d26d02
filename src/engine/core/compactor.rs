//! Compactor (spec §4.H): merges `fan_in` adjacent segments at a level into one segment
//! one level up, annotating each row with a `recency` hint (the system-time its validity
//! was fully superseded, per the polygon engine's own ceiling bookkeeping) so a later scan
//! can skip re-deriving it. A `fs2` advisory lock keeps at most one compaction running per
//! table, matching how the rest of this codebase guards exclusive on-disk operations.

use crate::engine::core::event::Event;
use crate::engine::core::iid::Iid;
use crate::engine::core::merge::planner::plan_merge_tasks;
use crate::engine::core::merge::queue::MergeQueue;
use crate::engine::core::polygon::PolygonEngine;
use crate::engine::core::segment::naming::{current_set, table_dir, SegmentId};
use crate::engine::core::segment::reader::SegmentReader;
use crate::engine::core::segment::writer::write_segment;
use crate::engine::errors::{CompactionError, SegmentError};
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::Path;
use tracing::info;

/// Picks the oldest `fan_in` segments at the lowest level that has at least that many,
/// since compacting the oldest data first keeps the level's segment count bounded.
pub fn select_compaction_group(
    data_dir: &Path,
    table: &str,
    fan_in: usize,
) -> Result<Option<(u32, Vec<SegmentId>)>, SegmentError> {
    let dir = table_dir(data_dir, table);
    let meta_dir = dir.join("meta");
    if !meta_dir.exists() {
        return Ok(None);
    }

    let mut ids = Vec::new();
    for entry in fs::read_dir(&meta_dir)? {
        let entry = entry?;
        if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
            if let Ok(id) = SegmentId::parse(stem) {
                ids.push(id);
            }
        }
    }

    let mut by_level: HashMap<u32, Vec<SegmentId>> = HashMap::new();
    for id in current_set(ids) {
        by_level.entry(id.level).or_default().push(id);
    }

    let mut levels: Vec<u32> = by_level.keys().copied().collect();
    levels.sort_unstable();
    for level in levels {
        let mut group = by_level.remove(&level).unwrap();
        if group.len() >= fan_in {
            group.sort_by_key(|id| id.first_row);
            group.truncate(fan_in);
            return Ok(Some((level, group)));
        }
    }
    Ok(None)
}

/// Merges `inputs` (all at `level`) into one new segment at `level + 1`, computing each
/// row's recency hint from a full-range polygon pass, then removes the input segment
/// files.
pub fn compact_group(
    data_dir: &Path,
    table: &str,
    level: u32,
    inputs: &[SegmentId],
    page_rows: usize,
) -> Result<SegmentId, CompactionError> {
    let dir = table_dir(data_dir, table);
    fs::create_dir_all(&dir)?;
    let lock_path = dir.join(".compaction.lock");
    let lock_file = File::create(&lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(|_| CompactionError::AlreadyRunning)?;

    let readers: Vec<SegmentReader> = inputs
        .iter()
        .map(|id| SegmentReader::open(&dir, *id))
        .collect::<Result<_, _>>()?;

    let tasks = plan_merge_tasks(&readers, &[], (i64::MIN, i64::MAX))?;

    let mut merged: Vec<Event> = Vec::new();
    let mut recency: HashMap<(Iid, i64), Option<i64>> = HashMap::new();

    for task in tasks {
        let mut queue = MergeQueue::new();
        for ptr in task.pointers {
            queue.add_pointer(ptr);
        }
        let mut engine = PolygonEngine::new();

        while let Some(idx) = queue.pop() {
            let event = queue.pointer(idx).current().unwrap().clone();
            let polygons = engine.process(&event, (i64::MIN, i64::MAX));
            queue.reinsert_after_advance(idx);

            let key = (event.iid, event.system_from);
            for polygon in &polygons {
                recency
                    .entry(key)
                    .and_modify(|existing| {
                        *existing = Some(match (*existing, polygon.system_to) {
                            (None, x) => x.unwrap_or(i64::MAX),
                            (Some(e), Some(x)) => e.min(x),
                            (Some(e), None) => e,
                        });
                    })
                    .or_insert(polygon.system_to);
            }
            merged.push(event);
        }
    }

    merged.sort_by(|a, b| a.iid.cmp(&b.iid).then(b.system_from.cmp(&a.system_from)));
    let recencies: Vec<Option<i64>> = merged
        .iter()
        .map(|e| recency.get(&(e.iid, e.system_from)).copied().flatten())
        .collect();

    let first_row = inputs.iter().map(|id| id.first_row).min().unwrap_or(0);
    let next_row = inputs.iter().map(|id| id.next_row).max().unwrap_or(0);
    let output_id = write_segment(
        data_dir,
        table,
        level + 1,
        first_row,
        page_rows,
        &merged,
        &recencies,
    )
    .map_err(CompactionError::from)
    .map(|written| SegmentId {
        first_row,
        next_row: next_row.max(written.next_row),
        ..written
    })?;

    for id in inputs {
        let _ = fs::remove_file(id.meta_path(&dir));
        let _ = fs::remove_file(id.data_path(&dir));
    }

    info!(
        target: "compactor",
        table,
        level,
        inputs = inputs.len(),
        rows = merged.len(),
        "compacted segment group"
    );
    lock_file.unlock().ok();
    Ok(output_id)
}

/// Repeatedly selects and runs a compaction until no level has `fan_in` or more segments.
pub fn compact_all(
    data_dir: &Path,
    table: &str,
    fan_in: usize,
    page_rows: usize,
) -> Result<usize, CompactionError> {
    let mut rounds = 0;
    while let Some((level, group)) = select_compaction_group(data_dir, table, fan_in)? {
        compact_group(data_dir, table, level, &group, page_rows)?;
        rounds += 1;
    }
    Ok(rounds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::core::event::Op;
    use crate::engine::core::iid::IdValue;
    use serde_json::json;
    use tempfile::tempdir;

    fn put(id: &str, system_from: i64) -> Event {
        Event::new(
            Iid::from_id_value(&IdValue::Str(id.to_string())),
            system_from,
            Op::Put {
                doc: json!({"name": id}),
                valid_from: 0,
                valid_to: None,
            },
        )
    }

    #[test]
    fn compacts_fan_in_segments_into_one_level_up() {
        let dir = tempdir().unwrap();
        for i in 0..4u64 {
            let events = vec![put(&format!("e{i}"), i as i64)];
            write_segment(dir.path(), "docs", 0, i * 10, 10, &events, &[]).unwrap();
        }

        let group = select_compaction_group(dir.path(), "docs", 4).unwrap().unwrap();
        assert_eq!(group.0, 0);
        assert_eq!(group.1.len(), 4);

        let output = compact_group(dir.path(), "docs", 0, &group.1, 10).unwrap();
        assert_eq!(output.level, 1);

        let remaining = select_compaction_group(dir.path(), "docs", 4).unwrap();
        assert!(remaining.is_none());
    }

    #[test]
    fn older_put_gets_finite_recency_after_compaction() {
        let dir = tempdir().unwrap();
        let id = "shared";
        write_segment(dir.path(), "docs", 0, 0, 10, &[put(id, 200)], &[]).unwrap();
        write_segment(dir.path(), "docs", 0, 1, 10, &[put(id, 100)], &[]).unwrap();
        write_segment(dir.path(), "docs", 0, 2, 10, &[put(id, 50)], &[]).unwrap();
        write_segment(dir.path(), "docs", 0, 3, 10, &[put(id, 25)], &[]).unwrap();

        let group = select_compaction_group(dir.path(), "docs", 4).unwrap().unwrap();
        let output = compact_group(dir.path(), "docs", 0, &group.1, 10).unwrap();

        let table = table_dir(dir.path(), "docs");
        let reader = SegmentReader::open(&table, output).unwrap();
        let page = reader.read_page(0).unwrap();
        assert_eq!(page.len(), 4);
    }
}
