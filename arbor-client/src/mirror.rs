//! Caller-owned local replica of a remote subtree
//!
//! A `Mirror` is the glue between a subscription and the core mutation
//! engine: it owns a root tree and applies inbound events in delivery
//! order. A mirror fed a subscription's events equals the server's
//! subtree at that scope.

use crate::stream::StreamEvent;
use arbor_core::tree;
use serde_json::{Map, Value};

#[derive(Debug, Default)]
pub struct Mirror {
    root: Map<String, Value>,
}

impl Mirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one stream event. `Error` events carry no mutation and are
    /// ignored here; reacting to them (reconnect, give up) is the
    /// caller's decision.
    pub fn apply(&mut self, event: &StreamEvent) -> arbor_core::Result<()> {
        match event {
            StreamEvent::Put { path, data } => tree::put(&mut self.root, path, data.clone()),
            StreamEvent::Patch { path, data } => tree::patch(&mut self.root, path, data.clone()),
            StreamEvent::Error => Ok(()),
        }
    }

    /// Read the local value at `path`.
    pub fn get(&self, path: &str) -> arbor_core::Result<Option<&Value>> {
        tree::get(&self.root, path)
    }

    pub fn root(&self) -> &Map<String, Value> {
        &self.root
    }

    /// The whole mirror as a JSON value (for rendering).
    pub fn snapshot(&self) -> Value {
        Value::Object(self.root.clone())
    }
}
