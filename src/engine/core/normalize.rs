//! Identifier normalization (spec §6): folds the assorted spellings a document's id and
//! column names can arrive in down to one canonical form, memoized so repeated folding of
//! the same raw string is cheap on the hot insert path.
//!
//! The mapping is bit-identical across implementations because it is baked into on-disk
//! column names: replace `-` with `_`; an initial `_` becomes `xt$`; `.` / `/` / `$` become
//! `$`; then lowercase.

use crate::engine::errors::CoreError;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde_json::Value;

static MEMO: Lazy<DashMap<String, String>> = Lazy::new(DashMap::new);

/// Idempotent identifier folding per the §6 rule.
pub fn normalize_field_name(raw: &str) -> String {
    if let Some(hit) = MEMO.get(raw) {
        return hit.clone();
    }
    let folded = fold(raw);
    MEMO.insert(raw.to_string(), folded.clone());
    folded
}

fn fold(raw: &str) -> String {
    let dashes_folded = raw.replace('-', "_");
    let initial_folded = if let Some(rest) = dashes_folded.strip_prefix('_') {
        format!("xt${rest}")
    } else {
        dashes_folded
    };
    let dollar_folded: String = initial_folded
        .chars()
        .map(|c| if matches!(c, '.' | '/' | '$') { '$' } else { c })
        .collect();
    dollar_folded.to_ascii_lowercase()
}

/// Applies [`normalize_field_name`] to every key of a document, honoring the collision
/// rule from SPEC_FULL.md §9.1: `xt/id` and `xt$id` may both be present only if they agree
/// once normalized; otherwise the write is rejected as `InvalidArgument`.
pub fn normalize_document(doc: &Value) -> Result<Value, CoreError> {
    let obj = doc
        .as_object()
        .ok_or_else(|| CoreError::InvalidArgument("document must be a JSON object".into()))?;

    let mut out = serde_json::Map::with_capacity(obj.len());
    for (raw_key, value) in obj {
        let key = normalize_field_name(raw_key);
        if let Some(existing) = out.get(&key) {
            if existing != value {
                return Err(CoreError::InvalidArgument(format!(
                    "conflicting values for normalized field '{key}' (raw key '{raw_key}')"
                )));
            }
            continue;
        }
        out.insert(key, value.clone());
    }
    Ok(Value::Object(out))
}
