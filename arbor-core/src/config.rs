//! Configuration for arbor

use crate::ArborError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration as TOML
pub const DEFAULT_CONFIG: &str = r#"# Arbor Configuration

[remote]
# Base URL of the remote tree store
base_url = "http://127.0.0.1:4000"
# Auth credential appended to every request (empty = none)
auth = ""
# Timeout for one-shot requests (e.g., "30s", "2m")
timeout = "30s"
# Express PATCH as POST with an X-HTTP-Method-Override header, for
# transports and proxies without a native PATCH verb
patch_via_post = false

[stream]
# Timeout for establishing the streaming connection. The connection
# itself has no overall timeout; it stays open until closed or errored.
connect_timeout = "10s"
"#;

/// Arbor configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub stream: StreamConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub auth: String,
    #[serde(default = "default_timeout")]
    pub timeout: String,
    #[serde(default)]
    pub patch_via_post: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: String,
}

// Default value functions
fn default_base_url() -> String {
    "http://127.0.0.1:4000".to_string()
}
fn default_timeout() -> String {
    "30s".to_string()
}
fn default_connect_timeout() -> String {
    "10s".to_string()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            auth: String::new(),
            timeout: default_timeout(),
            patch_via_post: false,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse config from TOML string
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| ArborError::ConfigParse(e.to_string()))
    }
}

impl RemoteConfig {
    /// Get the one-shot request timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        parse_duration(&self.timeout).unwrap_or(Duration::from_secs(30))
    }

    /// The credential to append, if one is configured
    pub fn auth_param(&self) -> Option<&str> {
        if self.auth.is_empty() {
            None
        } else {
            Some(&self.auth)
        }
    }
}

impl StreamConfig {
    /// Get the stream connect timeout as Duration
    pub fn connect_timeout_duration(&self) -> Duration {
        parse_duration(&self.connect_timeout).unwrap_or(Duration::from_secs(10))
    }
}

/// Parse duration string (e.g., "30s", "5m", "1h")
fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let (num_str, unit) = s.split_at(s.len() - 1);
    let num: u64 = num_str.parse().ok()?;

    match unit {
        "s" => Some(Duration::from_secs(num)),
        "m" => Some(Duration::from_secs(num * 60)),
        "h" => Some(Duration::from_secs(num * 3600)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config = Config::from_toml(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.remote.base_url, "http://127.0.0.1:4000");
        assert_eq!(config.remote.timeout, "30s");
        assert!(!config.remote.patch_via_post);
        assert_eq!(config.stream.connect_timeout, "10s");
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("invalid"), None);
    }

    #[test]
    fn test_empty_auth_is_no_credential() {
        let config = Config::default();
        assert_eq!(config.remote.auth_param(), None);

        let config = Config::from_toml("[remote]\nauth = \"secret\"\n").unwrap();
        assert_eq!(config.remote.auth_param(), Some("secret"));
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.remote.timeout_duration(), Duration::from_secs(30));
        assert_eq!(
            config.stream.connect_timeout_duration(),
            Duration::from_secs(10)
        );
    }
}
