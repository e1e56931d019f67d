//! JSON merge patch (RFC 7396): diff and apply.
//!
//! `apply` is backed by the `json-patch` crate's merge-patch implementation.
//! `diff` is hand-rolled: RFC 7396 defines how to *apply* a merge patch but
//! not how to *produce* one, and `json_patch::diff` in this crate generates
//! RFC 6902 operations, a different format entirely.

use crate::error::PatchError;
use serde_json::Value;

/// Produce a merge patch such that `apply(old, diff(old, new)) == new`.
///
/// Merge patch can only express "replace this key" or "remove this key";
/// it has no way to describe an array edit short of replacing the whole
/// array, so array-valued keys are always replaced wholesale rather than
/// diffed element-by-element.
pub fn diff(old: &Value, new: &Value) -> Value {
    match (old, new) {
        (Value::Object(old_map), Value::Object(new_map)) => {
            let mut patch = serde_json::Map::new();
            for (key, new_val) in new_map {
                match old_map.get(key) {
                    Some(old_val) if old_val == new_val => {}
                    Some(old_val) if old_val.is_object() && new_val.is_object() => {
                        let nested = diff(old_val, new_val);
                        if nested.as_object().is_some_and(|m| !m.is_empty()) {
                            patch.insert(key.clone(), nested);
                        }
                    }
                    _ => {
                        patch.insert(key.clone(), new_val.clone());
                    }
                }
            }
            for key in old_map.keys() {
                if !new_map.contains_key(key) {
                    patch.insert(key.clone(), Value::Null);
                }
            }
            Value::Object(patch)
        }
        _ => new.clone(),
    }
}

/// [`diff`] over raw JSON bytes, for callers that only hold serialized
/// objects (the Reconciler works with `Bytes`/`String`, not `Value`).
pub fn diff_bytes(old: &[u8], new: &[u8]) -> Result<Vec<u8>, PatchError> {
    let old_value: Value = serde_json::from_slice(old).map_err(|_| PatchError::MalformedBase)?;
    let new_value: Value = serde_json::from_slice(new).map_err(|_| PatchError::MalformedPatch)?;
    let patch = diff(&old_value, &new_value);
    Ok(serde_json::to_vec(&patch).expect("patch built from parsed JSON always serializes"))
}

/// Apply a merge patch to `base`, returning the patched document.
///
/// Fails only when `base` or `patch` is not well-formed JSON. Merge patch
/// application itself (RFC 7396) is total over any pair of JSON values —
/// a patch whose shape doesn't match `base` simply overwrites the
/// mismatched subtree rather than erroring. The "patch references a
/// missing key" failure mode lives one layer up, at the `Replica`: a key
/// with no prior `Add` has no base to patch against at all.
pub fn apply(base: &[u8], patch: &[u8]) -> Result<Vec<u8>, PatchError> {
    let mut base_value: Value = serde_json::from_slice(base).map_err(|_| PatchError::MalformedBase)?;
    let patch_value: Value = serde_json::from_slice(patch).map_err(|_| PatchError::MalformedPatch)?;
    json_patch::merge(&mut base_value, &patch_value);
    Ok(serde_json::to_vec(&base_value).expect("merged value always serializes"))
}
