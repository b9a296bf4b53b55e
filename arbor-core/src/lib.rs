//! Arbor Core - Path-addressed JSON tree mutation
//!
//! This library provides the mutation engine that keeps a local mirror of
//! a remote hierarchical JSON document convergent with the server: `put`
//! (full subtree replace/delete) and `patch` (shallow merge) applied at
//! slash-delimited paths, with deterministic ordered application.

pub mod config;
pub mod error;
pub mod path;
pub mod tree;

pub use config::{Config, RemoteConfig, StreamConfig};
pub use error::ArborError;
pub use path::{Target, ROOT_PATH};
pub use tree::{get, patch, put, EventBody, Operation};

/// Result type alias for arbor operations
pub type Result<T> = std::result::Result<T, ArborError>;
