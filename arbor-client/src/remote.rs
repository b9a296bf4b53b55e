//! HTTP client for one-shot exchanges with the remote tree store
//!
//! Every operation issues exactly one request against
//! `{base}/{name}.json?auth={credential}`: no retries, no queuing, no
//! concurrency limiting. Failures are deliberately fire-and-forget: a
//! non-200 status or transport error is logged and the result is simply
//! absent. Callers that need failure visibility use [`RemoteClient::test`]
//! or layer their own timeout; concurrent calls to overlapping paths race
//! and the store's last-write-wins semantics govern the outcome.

use arbor_core::{ArborError, RemoteConfig};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::warn;

pub struct RemoteClient {
    config: RemoteConfig,
    http: reqwest::blocking::Client,
}

impl RemoteClient {
    pub fn new(config: RemoteConfig) -> arbor_core::Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout_duration())
            .build()
            .map_err(|e| ArborError::Transport(e.to_string()))?;
        Ok(Self { config, http })
    }

    /// Read the value at `name`. Absent locations read as `null`.
    pub fn get(&self, name: &str) -> Option<Value> {
        let url = request_url(&self.config, name, &[]);
        self.dispatch("GET", name, self.http.get(&url))
    }

    /// Full replace at `name`. The store echoes the stored value.
    pub fn put(&self, name: &str, data: &Value) -> Option<Value> {
        let url = request_url(&self.config, name, &[]);
        self.dispatch("PUT", name, self.http.put(&url).json(data))
    }

    /// Shallow merge at `name`. The store echoes the merged entries.
    pub fn patch(&self, name: &str, data: &Value) -> Option<Value> {
        let url = request_url(&self.config, name, &[]);
        let req = if self.config.patch_via_post {
            // Transport fallback for stacks without a native PATCH verb
            self.http
                .post(&url)
                .header("X-HTTP-Method-Override", "PATCH")
                .json(data)
        } else {
            self.http.patch(&url).json(data)
        };
        self.dispatch("PATCH", name, req)
    }

    /// Append `data` under a store-generated child key; the response is
    /// `{"name": key}` with the generated key.
    pub fn post(&self, name: &str, data: &Value) -> Option<Value> {
        let url = request_url(&self.config, name, &[]);
        self.dispatch("POST", name, self.http.post(&url).json(data))
    }

    /// Delete the value at `name`.
    pub fn remove(&self, name: &str) -> Option<Value> {
        let url = request_url(&self.config, name, &[]);
        self.dispatch("DELETE", name, self.http.delete(&url))
    }

    /// Connectivity probe: a shallow read of the store root. Unlike the
    /// mutating calls this always reports, success or failure.
    pub fn test(&self) -> bool {
        let url = request_url(&self.config, "", &[("shallow", "true")]);
        match self.http.get(&url).send() {
            Ok(resp) if resp.status() == StatusCode::OK => true,
            Ok(resp) => {
                warn!("probe rejected: {}", resp.status());
                false
            }
            Err(err) => {
                warn!("probe failed: {err}");
                false
            }
        }
    }

    fn dispatch(
        &self,
        verb: &str,
        name: &str,
        req: reqwest::blocking::RequestBuilder,
    ) -> Option<Value> {
        let resp = match req.send() {
            Ok(resp) => resp,
            Err(err) => {
                warn!("{verb} {name:?} failed: {err}");
                return None;
            }
        };
        if resp.status() != StatusCode::OK {
            warn!("{verb} {name:?} rejected: {}", resp.status());
            return None;
        }
        match resp.json::<Value>() {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("{verb} {name:?} returned an undecodable body: {err}");
                None
            }
        }
    }
}

/// Build `{base}/{name}.json` with query parameters and the credential
/// appended. An empty name addresses the store root (`{base}/.json`).
pub(crate) fn request_url(config: &RemoteConfig, name: &str, extra: &[(&str, &str)]) -> String {
    let base = config.base_url.trim_end_matches('/');
    let mut url = format!("{}/{}.json", base, name.trim_matches('/'));
    let mut sep = '?';
    for (key, value) in extra {
        url.push(sep);
        url.push_str(key);
        url.push('=');
        url.push_str(value);
        sep = '&';
    }
    if let Some(auth) = config.auth_param() {
        url.push(sep);
        url.push_str("auth=");
        url.push_str(auth);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str, auth: &str) -> RemoteConfig {
        RemoteConfig {
            base_url: base_url.to_string(),
            auth: auth.to_string(),
            ..RemoteConfig::default()
        }
    }

    #[test]
    fn test_url_appends_suffix_and_auth() {
        let cfg = config("http://host:4000", "tok");
        assert_eq!(
            request_url(&cfg, "experiments/e1", &[]),
            "http://host:4000/experiments/e1.json?auth=tok"
        );
    }

    #[test]
    fn test_url_without_credential() {
        let cfg = config("http://host:4000/", "");
        assert_eq!(request_url(&cfg, "a", &[]), "http://host:4000/a.json");
    }

    #[test]
    fn test_url_for_store_root() {
        let cfg = config("http://host:4000", "tok");
        assert_eq!(
            request_url(&cfg, "", &[("shallow", "true")]),
            "http://host:4000/.json?shallow=true&auth=tok"
        );
    }

    #[test]
    fn test_url_trims_wrapping_slashes() {
        let cfg = config("http://host:4000", "");
        assert_eq!(request_url(&cfg, "/a/b/", &[]), "http://host:4000/a/b.json");
    }
}
