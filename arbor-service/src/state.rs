use arbor_core::{tree, ArborError, Operation};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::mpsc;

pub type SharedState = Arc<AppState>;

struct Subscriber {
    /// Sub-path name the subscriber is scoped to ("" = whole tree)
    scope: String,
    tx: mpsc::UnboundedSender<Operation>,
}

pub struct AppState {
    /// The authoritative tree
    tree: RwLock<Map<String, Value>>,
    subscribers: Mutex<HashMap<u64, Subscriber>>,
    next_subscriber: AtomicU64,
    /// Required auth credential; `None` accepts any request
    pub token: Option<String>,
}

fn lock_poisoned(err: impl std::fmt::Display) -> ArborError {
    ArborError::Io(io::Error::other(format!("state lock poisoned: {err}")))
}

impl AppState {
    pub fn new(token: Option<String>) -> Self {
        Self {
            tree: RwLock::new(Map::new()),
            subscribers: Mutex::new(HashMap::new()),
            next_subscriber: AtomicU64::new(1),
            token,
        }
    }

    /// Read the value at `name` ("" = whole tree). Absent locations read
    /// as `null`; `shallow` truncates object children to `true`.
    pub fn read(&self, name: &str, shallow: bool) -> arbor_core::Result<Value> {
        let tree = self.tree.read().map_err(lock_poisoned)?;
        let value = value_at(&tree, name);
        Ok(if shallow { shallow_view(value) } else { value })
    }

    /// Apply a mutation and fan it out to subscribers.
    ///
    /// The write lock is held across apply and fan-out, so the per
    /// subscriber event order equals the mutation order. Ordering matters
    /// for convergence; put and patch do not commute.
    pub fn apply(&self, op: &Operation) -> arbor_core::Result<()> {
        let mut tree = self.tree.write().map_err(lock_poisoned)?;
        op.clone().apply(&mut tree)?;

        let name = op.path().trim_matches('/').to_string();
        let mut subscribers = self.subscribers.lock().map_err(lock_poisoned)?;
        subscribers.retain(|_, sub| match scope_event(&tree, op, &name, &sub.scope) {
            Some(event) => sub.tx.send(event).is_ok(),
            None => true,
        });
        Ok(())
    }

    /// Register a subscriber scoped to `name`. The first queued event is
    /// a `put /` of the current value at the scope; the tree read lock is
    /// held across snapshot and registration so no mutation can slip in
    /// between.
    pub fn subscribe(
        &self,
        scope: String,
    ) -> arbor_core::Result<(u64, mpsc::UnboundedReceiver<Operation>)> {
        let tree = self.tree.read().map_err(lock_poisoned)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(Operation::Put {
            path: "/".to_string(),
            value: value_at(&tree, &scope),
        });
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .map_err(lock_poisoned)?
            .insert(id, Subscriber { scope, tx });
        Ok((id, rx))
    }

    pub fn unsubscribe(&self, id: u64) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.remove(&id);
        }
    }
}

/// The event a subscriber at `scope` sees for a mutation at `name`.
///
/// Strictly below the scope: the same operation with its path made
/// relative. At or above the scope: a fresh `put /` of the whole scoped
/// subtree (replaying the raw operation would need merge effects
/// re-derived client-side; a snapshot keeps mirrors convergent).
/// Disjoint: nothing.
fn scope_event(
    tree: &Map<String, Value>,
    op: &Operation,
    name: &str,
    scope: &str,
) -> Option<Operation> {
    if let Some(rel) = relative_to_scope(name, scope) {
        Some(match op {
            Operation::Put { value, .. } => Operation::Put { path: rel, value: value.clone() },
            Operation::Patch { value, .. } => Operation::Patch { path: rel, value: value.clone() },
        })
    } else if at_or_above(name, scope) {
        Some(Operation::Put {
            path: "/".to_string(),
            value: value_at(tree, scope),
        })
    } else {
        None
    }
}

/// Path of `name` relative to `scope`, when `name` is strictly below it.
fn relative_to_scope(name: &str, scope: &str) -> Option<String> {
    if scope.is_empty() {
        if name.is_empty() {
            return None;
        }
        return Some(format!("/{name}"));
    }
    name.strip_prefix(scope)
        .and_then(|rest| rest.strip_prefix('/'))
        .map(|rest| format!("/{rest}"))
}

fn at_or_above(name: &str, scope: &str) -> bool {
    if name.is_empty() || name == scope {
        return true;
    }
    scope
        .strip_prefix(name)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Current value at a scope name ("" = whole tree); absent scopes are
/// `null`.
fn value_at(tree: &Map<String, Value>, scope: &str) -> Value {
    if scope.is_empty() {
        return Value::Object(tree.clone());
    }
    tree::get(tree, &format!("/{scope}"))
        .ok()
        .flatten()
        .cloned()
        .unwrap_or(Value::Null)
}

/// Shallow read: object children truncate to `true`, primitives pass
/// through.
fn shallow_view(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, _)| (key, Value::Bool(true)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn put(path: &str, value: Value) -> Operation {
        Operation::Put { path: path.to_string(), value }
    }

    #[test]
    fn test_relative_to_scope() {
        assert_eq!(relative_to_scope("a/b", ""), Some("/a/b".to_string()));
        assert_eq!(relative_to_scope("a/b/c", "a/b"), Some("/c".to_string()));
        assert_eq!(relative_to_scope("a/b", "a/b"), None);
        assert_eq!(relative_to_scope("ab/c", "a"), None); // segment boundary
        assert_eq!(relative_to_scope("x", "a"), None);
    }

    #[test]
    fn test_at_or_above() {
        assert!(at_or_above("", "a/b"));
        assert!(at_or_above("a", "a/b"));
        assert!(at_or_above("a/b", "a/b"));
        assert!(!at_or_above("a/b/c", "a/b"));
        assert!(!at_or_above("ab", "a/b")); // segment boundary
        assert!(!at_or_above("x", "a/b"));
    }

    #[test]
    fn test_subscriber_below_scope_gets_relative_event() {
        let state = AppState::new(None);
        state.apply(&put("/a", json!({"b": 1}))).unwrap();
        let (_, mut rx) = state.subscribe("a".to_string()).unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            put("/", json!({"b": 1})) // initial snapshot
        );

        state.apply(&put("/a/c", json!(2))).unwrap();
        assert_eq!(rx.try_recv().unwrap(), put("/c", json!(2)));
    }

    #[test]
    fn test_mutation_above_scope_resends_snapshot() {
        let state = AppState::new(None);
        let (_, mut rx) = state.subscribe("a/b".to_string()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), put("/", Value::Null));

        state.apply(&put("/a", json!({"b": {"x": 1}}))).unwrap();
        assert_eq!(rx.try_recv().unwrap(), put("/", json!({"x": 1})));
    }

    #[test]
    fn test_patch_at_scope_resends_snapshot_as_put() {
        // A patch event at "/" would replace the mirror root rather than
        // merge into it, so at-scope patches arrive as snapshots.
        let state = AppState::new(None);
        state.apply(&put("/a", json!({"keep": 1}))).unwrap();
        let (_, mut rx) = state.subscribe("a".to_string()).unwrap();
        let _ = rx.try_recv().unwrap();

        state
            .apply(&Operation::Patch {
                path: "/a".to_string(),
                value: json!({"new": 2}),
            })
            .unwrap();
        assert_eq!(rx.try_recv().unwrap(), put("/", json!({"keep": 1, "new": 2})));
    }

    #[test]
    fn test_disjoint_mutation_is_not_forwarded() {
        let state = AppState::new(None);
        let (_, mut rx) = state.subscribe("a".to_string()).unwrap();
        let _ = rx.try_recv().unwrap();

        state.apply(&put("/other", json!(1))).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_receiver_prunes_subscriber() {
        let state = AppState::new(None);
        let (_, rx) = state.subscribe(String::new()).unwrap();
        drop(rx);
        state.apply(&put("/a", json!(1))).unwrap();
        assert!(state.subscribers.lock().unwrap().is_empty());
    }

    #[test]
    fn test_shallow_read_truncates_children() {
        let state = AppState::new(None);
        state
            .apply(&put("/", json!({"a": {"deep": 1}, "b": 5})))
            .unwrap();
        assert_eq!(
            state.read("", true).unwrap(),
            json!({"a": true, "b": true})
        );
        assert_eq!(state.read("b", true).unwrap(), json!(5));
    }
}
