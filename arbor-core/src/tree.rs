//! Path-addressed mutation of a JSON tree
//!
//! Two mutation kinds keep a local tree convergent with a server-authored
//! one: `put` fully replaces (or deletes) the subtree at a path, `patch`
//! shallow-merges an object into it. Both are deterministic, so applying
//! the same ordered sequence of operations to two copies of a tree yields
//! identical results. The root is always mutated in place, so callers that
//! hold a reference to it keep observing changes after a root replace.

use crate::path::{self, ROOT_PATH};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Wire body shared by stream events and mutation fan-out:
/// `{ "path": ..., "data": ... }`. The operation kind travels out of band
/// (as the stream event name).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBody {
    pub path: String,
    pub data: Value,
}

/// A single tree mutation, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Put { path: String, value: Value },
    Patch { path: String, value: Value },
}

impl Operation {
    /// The wire name of this operation kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Put { .. } => "put",
            Operation::Patch { .. } => "patch",
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Operation::Put { path, .. } | Operation::Patch { path, .. } => path,
        }
    }

    pub fn value(&self) -> &Value {
        match self {
            Operation::Put { value, .. } | Operation::Patch { value, .. } => value,
        }
    }

    /// Apply this operation to `root`.
    pub fn apply(self, root: &mut Map<String, Value>) -> crate::Result<()> {
        match self {
            Operation::Put { path, value } => put(root, &path, value),
            Operation::Patch { path, value } => patch(root, &path, value),
        }
    }
}

/// Full replace at `path`.
///
/// `put(root, "/", v)` replaces the whole tree: every existing key is
/// removed, then every key of `v` is copied in. The root map itself is
/// kept, never swapped for a new one. A `null` (or any non-object) value
/// at the root yields an empty tree.
///
/// At any other path, a `null` value removes the key and anything else
/// replaces whatever was there, including swapping a subtree for a
/// scalar or the other way around. Afterwards a read of the same path
/// returns exactly `value`, or absence if `value` was `null`.
pub fn put(root: &mut Map<String, Value>, path: &str, value: Value) -> crate::Result<()> {
    if path == ROOT_PATH {
        replace_root(root, value);
        return Ok(());
    }
    let target = path::resolve(root, path)?;
    if value.is_null() {
        target.container.remove(&target.key);
    } else {
        target.container.insert(target.key, value);
    }
    Ok(())
}

/// Shallow merge at `path`.
///
/// Each top-level key of `value` overwrites the matching key of the target
/// object; keys absent from `value` stay untouched. Patch never deletes:
/// removal requires a `put` of `null` at the nested path. A target that is
/// not currently an object (scalar, `null`, or absent) is first coerced to
/// an empty object, discarding the prior value.
///
/// At the root, patch is defined as a full replace, identical to `put` —
/// an intentional asymmetry with non-root paths. A non-object `value` is
/// a no-op: there are no entries to merge, and the coercion rule only
/// fires when at least one entry exists.
pub fn patch(root: &mut Map<String, Value>, path: &str, value: Value) -> crate::Result<()> {
    if path == ROOT_PATH {
        replace_root(root, value);
        return Ok(());
    }
    let Value::Object(entries) = value else {
        return Ok(());
    };
    if entries.is_empty() {
        return Ok(());
    }
    let target = path::resolve(root, path)?;
    let slot = target
        .container
        .entry(target.key)
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    if let Value::Object(existing) = slot {
        existing.extend(entries);
    }
    Ok(())
}

/// Read the value at `path`, with the same resolution rules as the
/// mutations. `Ok(None)` means the leaf is absent.
pub fn get<'t>(root: &'t Map<String, Value>, path: &str) -> crate::Result<Option<&'t Value>> {
    path::lookup(root, path)
}

/// Delete-all-then-copy root replacement, preserving the map's identity.
fn replace_root(root: &mut Map<String, Value>, value: Value) {
    root.clear();
    if let Value::Object(entries) = value {
        root.extend(entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn empty() -> Map<String, Value> {
        Map::new()
    }

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_put_round_trips_value() {
        let mut root = as_map(json!({"a": {"b": 1}}));
        put(&mut root, "/a/b", json!({"deep": [1, 2, 3]})).unwrap();
        assert_eq!(get(&root, "/a/b").unwrap(), Some(&json!({"deep": [1, 2, 3]})));
    }

    #[test]
    fn test_put_replaces_subtree_with_scalar() {
        let mut root = as_map(json!({"a": {"b": {"big": "subtree"}}}));
        put(&mut root, "/a/b", json!(7)).unwrap();
        assert_eq!(get(&root, "/a/b").unwrap(), Some(&json!(7)));
    }

    #[test]
    fn test_put_null_removes_key() {
        let mut root = as_map(json!({"a": {"b": 1, "keep": 2}}));
        put(&mut root, "/a/b", Value::Null).unwrap();
        assert_eq!(get(&root, "/a/b").unwrap(), None);
        assert_eq!(get(&root, "/a/keep").unwrap(), Some(&json!(2)));
    }

    #[test]
    fn test_put_root_replaces_all_keys() {
        let mut root = as_map(json!({"old": 1, "stale": {"x": 2}}));
        put(&mut root, "/", json!({"fresh": true})).unwrap();
        assert_eq!(Value::Object(root), json!({"fresh": true}));
    }

    #[test]
    fn test_put_root_null_empties_tree() {
        let mut root = as_map(json!({"old": 1}));
        put(&mut root, "/", Value::Null).unwrap();
        assert!(root.is_empty());
    }

    #[test]
    fn test_put_root_scalar_empties_tree() {
        // A scalar has no keys to copy in; same outcome as null
        let mut root = as_map(json!({"old": 1}));
        put(&mut root, "/", json!("hi")).unwrap();
        assert!(root.is_empty());
    }

    #[test]
    fn test_root_replace_preserves_identity() {
        // Later mutations through the same reference stay visible; the map
        // is cleared and refilled, never swapped out.
        let mut root = as_map(json!({"old": 1}));
        put(&mut root, "/", json!({"a": {}})).unwrap();
        put(&mut root, "/a/b", json!(2)).unwrap();
        assert_eq!(Value::Object(root), json!({"a": {"b": 2}}));
    }

    #[test]
    fn test_patch_merges_cumulatively() {
        let mut root = as_map(json!({"t": {}}));
        patch(&mut root, "/t", json!({"a": 1})).unwrap();
        patch(&mut root, "/t", json!({"b": 2})).unwrap();
        assert_eq!(get(&root, "/t").unwrap(), Some(&json!({"a": 1, "b": 2})));
    }

    #[test]
    fn test_patch_overwrites_only_named_keys() {
        let mut root = as_map(json!({"t": {"a": 1, "b": 2}}));
        patch(&mut root, "/t", json!({"b": 9, "c": 3})).unwrap();
        assert_eq!(get(&root, "/t").unwrap(), Some(&json!({"a": 1, "b": 9, "c": 3})));
    }

    #[test]
    fn test_patch_coerces_scalar_target() {
        let mut root = as_map(json!({"t": 5}));
        patch(&mut root, "/t", json!({"a": 1})).unwrap();
        assert_eq!(get(&root, "/t").unwrap(), Some(&json!({"a": 1})));
    }

    #[test]
    fn test_patch_coerces_absent_target() {
        let mut root = empty();
        patch(&mut root, "/t", json!({"a": 1})).unwrap();
        assert_eq!(get(&root, "/t").unwrap(), Some(&json!({"a": 1})));
    }

    #[test]
    fn test_patch_never_deletes() {
        let mut root = as_map(json!({"t": {"a": 1, "b": 2}}));
        patch(&mut root, "/t", json!({"a": 10})).unwrap();
        assert_eq!(get(&root, "/t").unwrap(), Some(&json!({"a": 10, "b": 2})));
    }

    #[test]
    fn test_patch_scalar_value_is_noop() {
        // No entries to merge means no coercion either
        let mut root = as_map(json!({"t": 5}));
        patch(&mut root, "/t", json!("nope")).unwrap();
        assert_eq!(get(&root, "/t").unwrap(), Some(&json!(5)));
    }

    #[test]
    fn test_patch_empty_object_is_noop() {
        let mut root = as_map(json!({"t": 5}));
        patch(&mut root, "/t", json!({})).unwrap();
        assert_eq!(get(&root, "/t").unwrap(), Some(&json!(5)));
    }

    #[test]
    fn test_patch_root_is_full_replace() {
        let mut root = as_map(json!({"a": 1, "b": 2}));
        patch(&mut root, "/", json!({"c": 3})).unwrap();
        assert_eq!(Value::Object(root), json!({"c": 3}));
    }

    #[test]
    fn test_repeated_patch_is_idempotent() {
        let mut root = as_map(json!({"t": {"a": 1}}));
        patch(&mut root, "/t", json!({"b": 2})).unwrap();
        let once = root.clone();
        patch(&mut root, "/t", json!({"b": 2})).unwrap();
        assert_eq!(root, once);
    }

    #[test]
    fn test_doubled_slash_paths_resolve_alike() {
        let mut a = as_map(json!({"a": {"b": {}}}));
        let mut b = a.clone();
        put(&mut a, "//a//b/", json!(1)).unwrap();
        put(&mut b, "/a/b/", json!(1)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_mutation_through_scalar_intermediate_errors() {
        let mut root = as_map(json!({"leaf": 5}));
        assert!(put(&mut root, "/leaf/x", json!(1)).is_err());
        assert!(patch(&mut root, "/leaf/x", json!({"a": 1})).is_err());
    }

    #[test]
    fn test_put_patch_put_scenario() {
        let mut root = empty();
        put(&mut root, "/x", json!("hi")).unwrap();
        assert_eq!(Value::Object(root.clone()), json!({"x": "hi"}));
        patch(&mut root, "/y", json!({"z": 1})).unwrap();
        assert_eq!(Value::Object(root.clone()), json!({"x": "hi", "y": {"z": 1}}));
        put(&mut root, "/x", Value::Null).unwrap();
        assert_eq!(Value::Object(root), json!({"y": {"z": 1}}));
    }

    #[test]
    fn test_ordered_operations_apply_in_sequence() {
        // put and patch do not commute; order of application is the
        // consistency guarantee
        let mut root = empty();
        let ops = vec![
            Operation::Put { path: "/a".into(), value: json!(1) },
            Operation::Patch { path: "/b".into(), value: json!({"c": 2}) },
            Operation::Put { path: "/a".into(), value: Value::Null },
        ];
        for op in ops {
            op.apply(&mut root).unwrap();
        }
        assert_eq!(Value::Object(root), json!({"b": {"c": 2}}));
    }
}
