//! Streaming subscription to the remote tree store's event feed
//!
//! [`subscribe`] opens one durable `text/event-stream` connection scoped
//! to a sub-path and spawns a reader thread that decodes the feed into
//! ordered [`StreamEvent`]s on a single channel. Delivery order equals
//! wire order — put and patch do not commute, so ordering is the
//! consistency guarantee.
//!
//! The subscription moves through Connecting -> Open -> {steady state |
//! Errored | Closed}. A connection-level failure delivers one terminal
//! [`StreamEvent::Error`] and ends the stream; there is no reconnecting
//! state. Reconnection, when wanted, is a fresh [`subscribe`] call.

use crate::remote::request_url;
use arbor_core::{Config, EventBody};
use crossbeam_channel::{unbounded, Receiver, Sender};
use reqwest::StatusCode;
use serde_json::Value;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// One decoded event from the feed.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Full replace at `path` (deletion when `data` is `null`).
    Put { path: String, data: Value },
    /// Shallow merge at `path`.
    Patch { path: String, data: Value },
    /// Terminal: the connection failed or was closed by the server.
    Error,
}

/// Handle to a live subscription. Dropping it closes the stream.
pub struct Subscription {
    events: Receiver<StreamEvent>,
    closed: Arc<AtomicBool>,
    _reader: thread::JoinHandle<()>,
}

impl Subscription {
    /// The ordered event channel.
    pub fn events(&self) -> &Receiver<StreamEvent> {
        &self.events
    }

    /// Close the connection — the only supported cancellation path.
    ///
    /// Takes effect when the reader next wakes (next event, keep-alive,
    /// or server close); no partial drain is attempted.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

/// Open a streaming subscription scoped to `name`.
///
/// The connection is established on the reader thread; a connect failure
/// surfaces as [`StreamEvent::Error`] like any later stream failure. On
/// success the server's first event is a `put` at `/` carrying the whole
/// current value at `name`, so an empty mirror converges immediately.
pub fn subscribe(config: &Config, name: &str) -> Subscription {
    let (tx, rx) = unbounded();
    let closed = Arc::new(AtomicBool::new(false));

    let url = request_url(&config.remote, name, &[]);
    let connect_timeout = config.stream.connect_timeout_duration();
    let label = name.trim_matches('/').to_string();
    let flag = Arc::clone(&closed);
    let reader = thread::spawn(move || reader_loop(url, label, connect_timeout, tx, flag));

    Subscription {
        events: rx,
        closed,
        _reader: reader,
    }
}

fn reader_loop(
    url: String,
    label: String,
    connect_timeout: Duration,
    tx: Sender<StreamEvent>,
    closed: Arc<AtomicBool>,
) {
    let client = match reqwest::blocking::Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(None::<Duration>)
        .build()
    {
        Ok(client) => client,
        Err(err) => {
            warn!("stream client for {label:?} failed to build: {err}");
            let _ = tx.send(StreamEvent::Error);
            return;
        }
    };

    let mut resp = match client
        .get(&url)
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
    {
        Ok(resp) => resp,
        Err(err) => {
            warn!("stream connect to {label:?} failed: {err}");
            let _ = tx.send(StreamEvent::Error);
            return;
        }
    };
    if resp.status() != StatusCode::OK {
        warn!("stream on {label:?} rejected: {}", resp.status());
        let _ = tx.send(StreamEvent::Error);
        return;
    }
    debug!("stream open on {label:?}");

    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; 8192];
    loop {
        if closed.load(Ordering::Relaxed) {
            return;
        }
        let n = match resp.read(&mut buf) {
            Ok(n) => n,
            Err(err) => {
                if !closed.load(Ordering::Relaxed) {
                    warn!("stream on {label:?} read failed: {err}");
                    let _ = tx.send(StreamEvent::Error);
                }
                return;
            }
        };
        if n == 0 {
            if !closed.load(Ordering::Relaxed) {
                warn!("stream on {label:?} closed by server");
                let _ = tx.send(StreamEvent::Error);
            }
            return;
        }
        for wire in decoder.feed(&buf[..n]) {
            if closed.load(Ordering::Relaxed) {
                return;
            }
            if let Some(event) = decode_event(wire) {
                if tx.send(event).is_err() {
                    // subscription handle dropped
                    return;
                }
            }
        }
    }
}

fn decode_event(wire: WireEvent) -> Option<StreamEvent> {
    match wire.name.as_str() {
        "put" | "patch" => match serde_json::from_str::<EventBody>(&wire.data) {
            Ok(body) => {
                let path = normalize_event_path(&body.path);
                Some(if wire.name == "put" {
                    StreamEvent::Put { path, data: body.data }
                } else {
                    StreamEvent::Patch { path, data: body.data }
                })
            }
            Err(err) => {
                // Corrupt body: skip the event, keep the stream alive
                warn!("corrupt {} event skipped: {err}", wire.name);
                None
            }
        },
        "keep-alive" => None,
        other => {
            debug!("ignoring {other:?} event");
            None
        }
    }
}

/// The store's event paths may omit the leading slash the local path
/// syntax requires; normalize at the boundary.
fn normalize_event_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// One wire-format event: the `event:` name plus its `data:` payload.
struct WireEvent {
    name: String,
    data: String,
}

/// Incremental event-stream decoder. Frames are terminated by a blank
/// line; partial frames are buffered until the terminator arrives, so
/// reads may split frames at arbitrary byte boundaries.
struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn feed(&mut self, bytes: &[u8]) -> Vec<WireEvent> {
        self.buf.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(end) = self.buf.windows(2).position(|w| w == b"\n\n") {
            let frame: Vec<u8> = self.buf.drain(..end + 2).collect();
            match std::str::from_utf8(&frame) {
                Ok(text) => {
                    if let Some(event) = parse_frame(text) {
                        events.push(event);
                    }
                }
                Err(err) => warn!("non-utf8 frame skipped: {err}"),
            }
        }
        events
    }
}

fn parse_frame(text: &str) -> Option<WireEvent> {
    let mut name = String::new();
    let mut data: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            warn!("stream line without a field name: {line:?}");
            continue;
        };
        match key.trim() {
            "event" => name = value.trim().to_string(),
            "data" => data.push(value.trim()),
            // Reconnect hints are unused; a subscription never reconnects
            "retry" => {}
            // An empty field name is a comment (used for keep-alives)
            "" => debug!("stream comment: {}", value.trim()),
            other => warn!("unknown stream field {other:?}"),
        }
    }

    if name.is_empty() || data.is_empty() {
        return None;
    }
    Some(WireEvent {
        name,
        data: data.join("\n"),
    })
}
