//! Per-column filters embedded in a segment's meta file (spec §4.B): a min/max range plus
//! a probabilistic membership filter, used by the merge planner to prune leaves that
//! cannot possibly contribute to a query before opening their data page.

use crate::shared::hash::stable_hash64;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use xorf::{BinaryFuse8, Filter};

/// Min/max + bloom summary for one column of one data page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnStats {
    pub min: Option<Value>,
    pub max: Option<Value>,
    filter: Option<BinaryFuse8>,
}

impl ColumnStats {
    pub fn build(values: &[Value]) -> Self {
        let mut min: Option<Value> = None;
        let mut max: Option<Value> = None;
        for v in values {
            if min.as_ref().is_none_or(|m| cmp_json(v, m).is_lt()) {
                min = Some(v.clone());
            }
            if max.as_ref().is_none_or(|m| cmp_json(v, m).is_gt()) {
                max = Some(v.clone());
            }
        }
        let keys: Vec<u64> = values.iter().map(hash_json).collect();
        let filter = if keys.is_empty() {
            None
        } else {
            BinaryFuse8::try_from(&keys).ok()
        };
        Self { min, max, filter }
    }

    /// `false` means the value is definitely absent from the page; `true` means maybe.
    pub fn may_contain(&self, value: &Value) -> bool {
        match &self.filter {
            Some(f) => f.contains(&hash_json(value)),
            None => false,
        }
    }

    pub fn excludes_range(&self, lo: &Value, hi: &Value) -> bool {
        match (&self.min, &self.max) {
            (Some(min), Some(max)) => cmp_json(max, lo).is_lt() || cmp_json(min, hi).is_gt(),
            _ => true,
        }
    }
}

fn hash_json(v: &Value) -> u64 {
    stable_hash64(&v.to_string())
}

fn cmp_json(a: &Value, b: &Value) -> std::cmp::Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(std::cmp::Ordering::Equal)
            .unwrap_or(std::cmp::Ordering::Equal),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// A segment-wide filter over raw 16-byte `iid`s, so the planner can tell in one check
/// whether a leaf could hold any row for an entity the live index or another leaf is
/// still completing the ceiling for, without walking its trie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IidBloom {
    filter: Option<BinaryFuse8>,
}

impl IidBloom {
    pub fn build(iids: &[[u8; 16]]) -> Self {
        let keys: Vec<u64> = iids.iter().map(|b| stable_hash64(b)).collect();
        let filter = if keys.is_empty() {
            None
        } else {
            BinaryFuse8::try_from(&keys).ok()
        };
        Self { filter }
    }

    pub fn may_contain(&self, iid: &[u8; 16]) -> bool {
        match &self.filter {
            Some(f) => f.contains(&stable_hash64(iid)),
            None => false,
        }
    }
}
