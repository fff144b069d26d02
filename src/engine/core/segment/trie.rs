//! The on-disk trie (spec §4.B): a dense-union index over a segment's rows, keyed first by
//! `iid` nibble (branching factor 4) and, once the `iid` prefix is exhausted, by the
//! event's recency (`system_from`, descending) so the merge planner can walk segments and
//! the live index in lockstep without decoding a data page.

use crate::engine::core::segment::bloom::{ColumnStats, IidBloom};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A leaf's column statistics, keyed by normalized column name (§6).
pub type LeafColumns = BTreeMap<String, ColumnStats>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrieNode {
    /// No rows below this path.
    Nil,
    /// Branches on the next `iid` nibble (0..=3); any entry may itself be `Nil`.
    BranchIid(Box<[TrieNode; 4]>),
    /// Once the `iid` is fully resolved to one entity, branches on `system_from`
    /// descending so the newest revision is found first.
    BranchRecency(BTreeMap<i64, Box<TrieNode>>),
    /// A data page reference: the rows for this path live at `data_page_idx` in the
    /// segment's data file, restricted to these columns' worth of pushdown-able stats.
    Leaf {
        data_page_idx: u32,
        columns: LeafColumns,
        iid_bloom: IidBloom,
    },
}

impl TrieNode {
    pub fn empty_branch() -> Self {
        TrieNode::BranchIid(Box::new([
            TrieNode::Nil,
            TrieNode::Nil,
            TrieNode::Nil,
            TrieNode::Nil,
        ]))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, TrieNode::Nil)
    }

    /// Descends by nibble path, returning the node at that path if one exists and isn't
    /// `Nil`. Does not descend into `BranchRecency` levels (those aren't addressed by
    /// `iid` nibbles).
    pub fn descend<'a>(&'a self, path: &[u8]) -> Option<&'a TrieNode> {
        let mut node = self;
        for &nibble in path {
            match node {
                TrieNode::BranchIid(children) => {
                    node = &children[nibble as usize];
                    if node.is_nil() {
                        return None;
                    }
                }
                TrieNode::Nil => return None,
                _ => return None,
            }
        }
        Some(node)
    }

    /// Inserts a leaf at the given nibble path, building intermediate branches as needed.
    pub fn insert_leaf(
        &mut self,
        path: &[u8],
        data_page_idx: u32,
        columns: LeafColumns,
        iid_bloom: IidBloom,
    ) {
        if path.is_empty() {
            *self = TrieNode::Leaf {
                data_page_idx,
                columns,
                iid_bloom,
            };
            return;
        }
        if matches!(self, TrieNode::Nil) {
            *self = TrieNode::empty_branch();
        }
        match self {
            TrieNode::BranchIid(children) => {
                children[path[0] as usize].insert_leaf(&path[1..], data_page_idx, columns, iid_bloom);
            }
            _ => unreachable!("insert_leaf called on a non-branch node"),
        }
    }
}
