//! Canonical JSON hashing, modulo a configured set of ignored paths.
//!
//! Canonical form: key-ordered, whitespace-normalized JSON. `serde_json`'s
//! `Value` keeps object keys in insertion order unless the `preserve_order`
//! feature is disabled for the whole dependency graph, which this crate
//! cannot assume of its callers — so canonicalization rebuilds every object
//! through a `BTreeMap` to force lexicographic key order before hashing,
//! rather than relying on a Cargo feature flag elsewhere in the tree.

use crate::error::HashError;
use serde_json::Value;
use std::collections::BTreeMap;

/// Canonical 32-byte digest of `bytes`, after removing `ignored_paths`.
///
/// `ignored_paths` entries look like `.status.conditions`: a leading dot
/// followed by dot-separated object keys, resolved from the document root.
/// A path that doesn't resolve (missing intermediate key, or resolves
/// through a non-object) is silently skipped — the hash already excludes
/// information that was never there.
pub fn canonical_hash(bytes: &[u8], ignored_paths: &[String]) -> Result<[u8; 32], HashError> {
    let mut value: Value = serde_json::from_slice(bytes).map_err(|_| HashError::MalformedInput)?;
    for path in ignored_paths {
        remove_path(&mut value, path);
    }
    let canonical = canonicalize(&value);
    // `canonical` is built entirely from already-parsed JSON, so re-serializing
    // cannot fail.
    let bytes = serde_json::to_vec(&canonical).expect("canonical value always serializes");
    Ok(*blake3::hash(&bytes).as_bytes())
}

fn remove_path(value: &mut Value, path: &str) {
    let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
    let Some((leaf, parents)) = segments.split_last() else {
        return;
    };
    let mut current = value;
    for seg in parents {
        match current.get_mut(*seg) {
            Some(next) => current = next,
            None => return,
        }
    }
    if let Some(obj) = current.as_object_mut() {
        obj.remove(*leaf);
    }
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&str, Value> =
                map.iter().map(|(k, v)| (k.as_str(), canonicalize(v))).collect();
            let mut out = serde_json::Map::with_capacity(sorted.len());
            for (k, v) in sorted {
                out.insert(k.to_string(), v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_order_does_not_affect_hash() {
        let a = br#"{"a":1,"b":2}"#;
        let b = br#"{"b":2,"a":1}"#;
        assert_eq!(canonical_hash(a, &[]).unwrap(), canonical_hash(b, &[]).unwrap());
    }

    #[test]
    fn whitespace_does_not_affect_hash() {
        let a = br#"{"a":1}"#;
        let b = br#"{ "a" : 1 }"#;
        assert_eq!(canonical_hash(a, &[]).unwrap(), canonical_hash(b, &[]).unwrap());
    }

    #[test]
    fn ignored_path_is_elided() {
        let ignored = vec![".status.conditions".to_string()];
        let a = br#"{"status":{"conditions":[1,2,3],"phase":"Ready"}}"#;
        let b = br#"{"status":{"conditions":[],"phase":"Ready"}}"#;
        assert_eq!(
            canonical_hash(a, &ignored).unwrap(),
            canonical_hash(b, &ignored).unwrap()
        );
    }

    #[test]
    fn non_ignored_difference_changes_hash() {
        let a = br#"{"a":1}"#;
        let b = br#"{"a":2}"#;
        assert_ne!(canonical_hash(a, &[]).unwrap(), canonical_hash(b, &[]).unwrap());
    }

    #[test]
    fn malformed_input_is_reported() {
        let bad = b"{not json";
        assert!(matches!(canonical_hash(bad, &[]), Err(HashError::MalformedInput)));
    }

    #[test]
    fn missing_ignored_path_is_skipped_not_fatal() {
        let a = br#"{"a":1}"#;
        let ignored = vec![".status.conditions".to_string()];
        assert!(canonical_hash(a, &ignored).is_ok());
    }
}
