//! Segment writer (spec §4.B): turns a sorted run of events into a meta/data file pair,
//! shared by the initial flush from the live index and by the compactor.

use crate::engine::core::event::Event;
use crate::engine::core::segment::bloom::{ColumnStats, IidBloom};
use crate::engine::core::segment::data_page::{events_to_record_batch, page_schema};
use crate::engine::core::segment::meta::SegmentMeta;
use crate::engine::core::segment::naming::{table_dir, SegmentId};
use crate::engine::core::segment::trie::{LeafColumns, TrieNode};
use crate::engine::errors::SegmentError;
use arrow_ipc::writer::FileWriter;
use std::fs::{self, File};
use std::path::Path;
use tracing::info;

/// Writes `events` (already sorted `(iid asc, system_from desc)`) as one new segment at
/// `level`, chunked into data pages of at most `page_rows` rows apiece, and returns the
/// segment's id. `recency`, if non-empty, must align 1:1 with `events` (the compactor
/// fills it in; a plain flush from the live index passes `&[]`).
pub fn write_segment(
    data_dir: &Path,
    table: &str,
    level: u32,
    first_row: u64,
    page_rows: usize,
    events: &[Event],
    recency: &[Option<i64>],
) -> Result<SegmentId, SegmentError> {
    let dir = table_dir(data_dir, table);
    fs::create_dir_all(dir.join("meta"))?;
    fs::create_dir_all(dir.join("data"))?;

    let next_row = first_row + events.len() as u64;
    let id = SegmentId {
        level,
        first_row,
        next_row,
    };

    let mut trie = TrieNode::Nil;
    let schema = std::sync::Arc::new(page_schema());
    let data_file = File::create(id.data_path(&dir))?;
    let mut ipc_writer = FileWriter::try_new(data_file, &schema)?;

    for (page_idx, chunk) in events.chunks(page_rows.max(1)).enumerate() {
        let offset = page_idx * page_rows.max(1);
        let page_recency = if recency.is_empty() {
            &[][..]
        } else {
            &recency[offset..offset + chunk.len()]
        };
        let batch = events_to_record_batch(chunk, page_recency)?;
        ipc_writer.write(&batch)?;

        let columns = column_stats_for(chunk);
        let iid_bytes: Vec<[u8; 16]> = chunk.iter().map(|e| e.iid.0).collect();
        let iid_bloom = IidBloom::build(&iid_bytes);

        let path: Vec<u8> = chunk[0].iid.nibbles().collect();
        trie.insert_leaf(&path, page_idx as u32, columns, iid_bloom);
    }
    ipc_writer.finish()?;

    let meta = SegmentMeta {
        level,
        first_row,
        next_row,
        trie,
    };
    meta.write_to(&id.meta_path(&dir))?;

    info!(target: "segment::writer", table, level, first_row, next_row, "wrote segment");
    Ok(id)
}

fn column_stats_for(events: &[Event]) -> LeafColumns {
    let mut out = LeafColumns::new();
    let system_froms: Vec<serde_json::Value> =
        events.iter().map(|e| serde_json::json!(e.system_from)).collect();
    out.insert("system_from".to_string(), ColumnStats::build(&system_froms));

    if let Some(doc_fields) = events
        .iter()
        .filter_map(|e| e.document())
        .find_map(|d| d.as_object())
    {
        for key in doc_fields.keys() {
            let values: Vec<serde_json::Value> = events
                .iter()
                .filter_map(|e| e.document().and_then(|d| d.get(key)).cloned())
                .collect();
            if !values.is_empty() {
                out.insert(key.clone(), ColumnStats::build(&values));
            }
        }
    }
    out
}
