//! Segment file naming and current-set selection (spec §6): each segment is a pair of
//! files at `tables/<table>/{meta,data}/log-l<LL>-fr<FF>-nr<NN>.arrow`. A table's current
//! readable set keeps every segment whose row range isn't already fully covered by some
//! segment at a strictly higher level; segments at the same level coexist as siblings
//! until the compactor merges them.

use crate::engine::core::normalize::normalize_field_name;
use crate::engine::errors::SegmentError;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SegmentId {
    pub level: u32,
    pub first_row: u64,
    pub next_row: u64,
}

impl SegmentId {
    pub fn file_stem(&self) -> String {
        format!(
            "log-l{:02}-fr{:010}-nr{:010}",
            self.level, self.first_row, self.next_row
        )
    }

    pub fn meta_path(&self, table_dir: &std::path::Path) -> PathBuf {
        table_dir.join("meta").join(format!("{}.arrow", self.file_stem()))
    }

    pub fn data_path(&self, table_dir: &std::path::Path) -> PathBuf {
        table_dir.join("data").join(format!("{}.arrow", self.file_stem()))
    }

    /// Parses `log-l<LL>-fr<FF>-nr<NN>` back out of a file stem (extension already
    /// stripped by the caller).
    pub fn parse(stem: &str) -> Result<Self, SegmentError> {
        let parts: Vec<&str> = stem.split('-').collect();
        if parts.len() != 4 || parts[0] != "log" {
            return Err(SegmentError::InvalidName(stem.to_string()));
        }
        let level = parts[1]
            .strip_prefix('l')
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| SegmentError::InvalidName(stem.to_string()))?;
        let first_row = parts[2]
            .strip_prefix("fr")
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| SegmentError::InvalidName(stem.to_string()))?;
        let next_row = parts[3]
            .strip_prefix("nr")
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| SegmentError::InvalidName(stem.to_string()))?;
        Ok(Self {
            level,
            first_row,
            next_row,
        })
    }
}

pub fn table_dir(data_dir: &std::path::Path, table: &str) -> PathBuf {
    data_dir.join("tables").join(normalize_field_name(table))
}

/// Picks the current readable set from every known segment id for a table: several
/// segments may coexist at one level (they coexist until fan-in compaction merges them),
/// but a segment at any level is dropped once a higher level's segment fully covers its
/// row range, since compaction has already folded its rows in there.
pub fn current_set(ids: Vec<SegmentId>) -> Vec<SegmentId> {
    let mut by_level_desc = ids;
    by_level_desc.sort_by_key(|id| std::cmp::Reverse(id.level));

    let mut kept: Vec<SegmentId> = Vec::new();
    for id in by_level_desc {
        let covered = kept
            .iter()
            .any(|higher| higher.level > id.level && higher.first_row <= id.first_row && higher.next_row >= id.next_row);
        if !covered {
            kept.push(id);
        }
    }
    kept.sort_by(|a, b| a.level.cmp(&b.level).then(a.first_row.cmp(&b.first_row)));
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_file_stem() {
        let id = SegmentId {
            level: 2,
            first_row: 100,
            next_row: 200,
        };
        let parsed = SegmentId::parse(&id.file_stem()).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn current_set_keeps_sibling_segments_at_same_level() {
        let ids = vec![
            SegmentId {
                level: 0,
                first_row: 0,
                next_row: 50,
            },
            SegmentId {
                level: 0,
                first_row: 50,
                next_row: 100,
            },
        ];
        let set = current_set(ids);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn current_set_drops_covered_lower_level() {
        let ids = vec![
            SegmentId {
                level: 0,
                first_row: 0,
                next_row: 50,
            },
            SegmentId {
                level: 1,
                first_row: 0,
                next_row: 100,
            },
        ];
        let set = current_set(ids);
        assert_eq!(set.len(), 1);
        assert_eq!(set[0].level, 1);
    }
}
