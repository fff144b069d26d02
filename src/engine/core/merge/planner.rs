//! Merge planner (spec §4.F): a synchronous preorder walk across every contributing
//! segment's trie and the live index's buckets, grouped to the live index's nibble-prefix
//! depth so a live bucket and its on-disk counterparts land in the same task. Leaves whose
//! `system_from` column stats can't possibly intersect the query's system-time range are
//! pruned before their data page is ever opened.

use crate::engine::core::event::Event;
use crate::engine::core::live_index::LIVE_INDEX_DEPTH;
use crate::engine::core::merge::pointer::{EventRowPointer, Source};
use crate::engine::core::segment::reader::SegmentReader;
use crate::engine::core::segment::trie::{LeafColumns, TrieNode};
use crate::engine::errors::MergeError;
use std::collections::BTreeSet;

/// One unit of merge work: every leaf (segment page or live bucket) whose rows share the
/// same depth-8 `iid` nibble prefix, ready to be fed to a [`super::queue::MergeQueue`].
pub struct MergeTask {
    pub path: Vec<u8>,
    pub pointers: Vec<EventRowPointer>,
}

pub fn plan_merge_tasks(
    segments: &[SegmentReader],
    live_buckets: &[(Vec<u8>, Vec<Event>)],
    system_range: (i64, i64),
) -> Result<Vec<MergeTask>, MergeError> {
    let mut paths: BTreeSet<Vec<u8>> = BTreeSet::new();
    for (path, _) in live_buckets {
        paths.insert(path.clone());
    }
    for seg in segments {
        collect_branch_paths(&seg.meta.trie, Vec::new(), LIVE_INDEX_DEPTH, &mut paths);
    }

    let mut tasks = Vec::new();
    for path in paths {
        let mut pointers = Vec::new();

        for (bucket_path, events) in live_buckets {
            if *bucket_path == path && !events.is_empty() {
                pointers.push(EventRowPointer::new(events.clone(), Source::Live));
            }
        }

        for seg in segments {
            if let Some(node) = seg.meta.trie.descend(&path) {
                let mut leaves = Vec::new();
                collect_leaves(node, &mut leaves);
                for (page_idx, columns) in leaves {
                    if prune_by_system_from(&columns, system_range) {
                        continue;
                    }
                    let rows = seg.read_page(page_idx)?;
                    if !rows.is_empty() {
                        pointers.push(EventRowPointer::new(
                            rows,
                            Source::Segment { level: seg.id.level },
                        ));
                    }
                }
            }
        }

        if !pointers.is_empty() {
            tasks.push(MergeTask { path, pointers });
        }
    }
    Ok(tasks)
}

fn prune_by_system_from(columns: &LeafColumns, system_range: (i64, i64)) -> bool {
    match columns.get("system_from") {
        Some(stats) => {
            stats.excludes_range(&serde_json::json!(system_range.0), &serde_json::json!(system_range.1))
        }
        None => false,
    }
}

fn collect_branch_paths(
    node: &TrieNode,
    prefix: Vec<u8>,
    remaining_depth: usize,
    out: &mut BTreeSet<Vec<u8>>,
) {
    if remaining_depth == 0 {
        out.insert(prefix);
        return;
    }
    match node {
        TrieNode::BranchIid(children) => {
            for (nibble, child) in children.iter().enumerate() {
                if !child.is_nil() {
                    let mut next = prefix.clone();
                    next.push(nibble as u8);
                    collect_branch_paths(child, next, remaining_depth - 1, out);
                }
            }
        }
        TrieNode::Nil => {}
        _ => {
            out.insert(prefix);
        }
    }
}

fn collect_leaves(node: &TrieNode, out: &mut Vec<(u32, LeafColumns)>) {
    match node {
        TrieNode::Leaf {
            data_page_idx,
            columns,
            ..
        } => out.push((*data_page_idx, columns.clone())),
        TrieNode::BranchIid(children) => {
            for child in children.iter() {
                collect_leaves(child, out);
            }
        }
        TrieNode::BranchRecency(map) => {
            for child in map.values() {
                collect_leaves(child, out);
            }
        }
        TrieNode::Nil => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::core::event::Op;
    use crate::engine::core::iid::{IdValue, Iid};
    use crate::engine::core::live_index::LiveIndex;
    use crate::engine::core::segment::naming::table_dir;
    use crate::engine::core::segment::writer::write_segment;
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
    fn plans_one_task_per_distinct_prefix_and_merges_live_with_disk() {
        let dir = tempdir().unwrap();
        let mut events = vec![put("a", 1), put("b", 2)];
        events.sort_by(|x, y| x.iid.cmp(&y.iid).then(y.system_from.cmp(&x.system_from)));
        let id = write_segment(dir.path(), "docs", 0, 0, 10, &events, &[]).unwrap();
        let table = table_dir(dir.path(), "docs");
        let reader = SegmentReader::open(&table, id).unwrap();

        let live = LiveIndex::new(10);
        live.insert(put("c", 3)).unwrap();
        let buckets = live.sorted_buckets();

        let tasks = plan_merge_tasks(&[reader], &buckets, (0, 1000)).unwrap();
        let total_rows: usize = tasks
            .iter()
            .flat_map(|t| &t.pointers)
            .map(|p| if p.valid() { 1 } else { 0 })
            .sum();
        assert!(total_rows >= 1);
        assert!(!tasks.is_empty());
    }

    #[test]
    fn prunes_pages_outside_system_range() {
        let dir = tempdir().unwrap();
        let events = vec![put("a", 500)];
        let id = write_segment(dir.path(), "docs", 0, 0, 10, &events, &[]).unwrap();
        let table = table_dir(dir.path(), "docs");
        let reader = SegmentReader::open(&table, id).unwrap();

        let tasks = plan_merge_tasks(&[reader], &[], (0, 100)).unwrap();
        assert!(tasks.is_empty());
    }
}
