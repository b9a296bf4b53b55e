//! Error types for arbor operations

#[derive(Debug, thiserror::Error)]
pub enum ArborError {
    #[error("path {path:?} does not resolve: segment {segment:?} is not a container")]
    PathResolution { path: String, segment: String },

    #[error("Config parse error: {0}")]
    ConfigParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),
}
