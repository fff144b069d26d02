//! Entity-id hashing and nibble-trie addressing (spec §4.A).
//!
//! Every document is addressed internally by a 16-byte `Iid`, derived from its `xt$id`
//! (or `xt/id`, see [`crate::engine::core::normalize`]) value. The hash is split into two
//! independent 64-bit lanes so that the full 128 bits come from two different hash
//! families rather than a single 64-bit hash copied twice (see SPEC_FULL.md §9.1).

use crate::shared::hash::stable_hash64;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::hash::{Hash, Hasher};

/// The canonical, typed form of a user-supplied identifier, prior to hashing.
///
/// Two identifiers hash to the same `Iid` iff they are `==` after canonicalization here —
/// `IdValue::Int(42)` and `IdValue::Str("42")` are deliberately distinct identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdValue {
    Str(String),
    Int(i64),
    Uuid([u8; 16]),
    Keyword(String),
}

impl IdValue {
    fn type_tag(&self) -> u8 {
        match self {
            IdValue::Str(_) => 0,
            IdValue::Int(_) => 1,
            IdValue::Uuid(_) => 2,
            IdValue::Keyword(_) => 3,
        }
    }

    fn canonical_bytes(&self) -> Vec<u8> {
        match self {
            IdValue::Str(s) => s.as_bytes().to_vec(),
            IdValue::Int(i) => i.to_be_bytes().to_vec(),
            IdValue::Uuid(u) => u.to_vec(),
            IdValue::Keyword(k) => k.as_bytes().to_vec(),
        }
    }

    /// Canonicalizes a normalized `xt$id` JSON value into the typed form `Iid::from_id_value`
    /// hashes. A string is a UUID if it parses as one, a keyword if it carries a leading
    /// `:`, and a plain string otherwise; `None` for anything else (arrays/objects/null
    /// can't identify an entity).
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => {
                if let Ok(uuid) = uuid::Uuid::parse_str(s) {
                    Some(IdValue::Uuid(*uuid.as_bytes()))
                } else if let Some(keyword) = s.strip_prefix(':') {
                    Some(IdValue::Keyword(keyword.to_string()))
                } else {
                    Some(IdValue::Str(s.clone()))
                }
            }
            Value::Number(n) => n.as_i64().map(IdValue::Int),
            _ => None,
        }
    }
}

/// 16-byte entity-id hash. Rows belonging to the same logical entity always carry the
/// same `Iid`; the trie (§4.B) and live index (§4.C) key on it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Iid(pub [u8; 16]);

impl Iid {
    pub fn from_id_value(value: &IdValue) -> Self {
        let mut tagged = Vec::with_capacity(1 + 24);
        tagged.push(value.type_tag());
        tagged.extend_from_slice(&value.canonical_bytes());

        let lane_a = stable_hash64(&tagged);
        let lane_b = ahash_lane(&tagged);

        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&lane_a.to_be_bytes());
        bytes[8..].copy_from_slice(&lane_b.to_be_bytes());
        Iid(bytes)
    }

    /// Sequence of 2-bit nibbles (branching factor 4) read most-significant-first, as
    /// consumed by the trie (§4.B) during descent.
    pub fn nibbles(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.iter().flat_map(|byte| {
            [
                (byte >> 6) & 0b11,
                (byte >> 4) & 0b11,
                (byte >> 2) & 0b11,
                byte & 0b11,
            ]
        })
    }

    /// Total number of nibbles addressable in an `Iid` (64, at 2 bits each over 128 bits).
    pub const NIBBLE_COUNT: usize = 64;

    /// Compares this id's nibble path against a partial prefix, returning `Ordering` as if
    /// the prefix were extended with this id's remaining nibbles. Used by the trie walk
    /// (§4.F) to decide whether an id falls within a given subtree.
    pub fn compare_to_path(&self, path: &[u8]) -> std::cmp::Ordering {
        let own: Vec<u8> = self.nibbles().take(path.len()).collect();
        own.as_slice().cmp(path)
    }

    /// True if this id's nibble path starts with `prefix`.
    pub fn starts_with_path(&self, prefix: &[u8]) -> bool {
        self.nibbles().take(prefix.len()).eq(prefix.iter().copied())
    }
}

impl fmt::Debug for Iid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Iid(")?;
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        write!(f, ")")
    }
}

fn ahash_lane(tagged: &[u8]) -> u64 {
    let mut hasher = ahash::AHasher::default();
    tagged.hash(&mut hasher);
    hasher.finish()
}
