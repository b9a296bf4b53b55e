//! Slash-delimited path resolution against a JSON tree
//!
//! A path has the form `/seg1/seg2/.../segN`. Empty intermediate segments
//! (leading or doubled slashes) are skipped, so `//a///b` resolves the same
//! way as `/a/b`. The final segment is always the target key, even when it
//! is the empty string: `/x/` addresses key `""` inside `/x`. The path `/`
//! alone denotes the whole tree and never reaches `resolve`; mutations
//! special-case it before resolving.

use crate::error::ArborError;
use serde_json::{Map, Value};

/// The path that addresses the whole tree.
pub const ROOT_PATH: &str = "/";

/// Resolution of a non-root path: the container one level above the leaf,
/// plus the leaf key. The key is not looked up; it may be absent.
#[derive(Debug)]
pub struct Target<'t> {
    pub container: &'t mut Map<String, Value>,
    pub key: String,
}

/// Resolve `path` to the (container, key) pair it addresses.
///
/// Fails fast with [`ArborError::PathResolution`] when an intermediate
/// segment is absent or present but not an object. Intermediate containers
/// are never created implicitly.
pub fn resolve<'t>(
    root: &'t mut Map<String, Value>,
    path: &str,
) -> crate::Result<Target<'t>> {
    let mut segments = path.split('/');
    let key = segments.next_back().unwrap_or_default().to_string();

    let mut container = root;
    for segment in segments {
        if segment.is_empty() {
            continue;
        }
        container = match container.get_mut(segment) {
            Some(Value::Object(child)) => child,
            _ => {
                return Err(ArborError::PathResolution {
                    path: path.to_string(),
                    segment: segment.to_string(),
                })
            }
        };
    }

    Ok(Target { container, key })
}

/// Read-only walk with the same resolution rules as [`resolve`].
///
/// Returns `Ok(None)` when the leaf key is absent; intermediate failures
/// are the same fail-fast error as the mutating path.
pub fn lookup<'t>(
    root: &'t Map<String, Value>,
    path: &str,
) -> crate::Result<Option<&'t Value>> {
    let mut segments = path.split('/');
    let key = segments.next_back().unwrap_or_default();

    let mut container = root;
    for segment in segments {
        if segment.is_empty() {
            continue;
        }
        container = match container.get(segment) {
            Some(Value::Object(child)) => child,
            _ => {
                return Err(ArborError::PathResolution {
                    path: path.to_string(),
                    segment: segment.to_string(),
                })
            }
        };
    }

    Ok(container.get(key))
}
