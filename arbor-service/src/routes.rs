use crate::error::AppError;
use crate::state::SharedState;
use arbor_core::{EventBody, Operation};
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::Stream;
use serde::Deserialize;
use serde_json::Value;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Deserialize)]
pub struct RequestParams {
    pub auth: Option<String>,
    pub shallow: Option<bool>,
}

fn authorize(state: &SharedState, params: &RequestParams) -> Result<(), AppError> {
    match &state.token {
        Some(token) if params.auth.as_deref() != Some(token.as_str()) => {
            Err(AppError::unauthorized())
        }
        _ => Ok(()),
    }
}

/// Locations are addressed as `{name}.json`; the store root is `/.json`.
fn parse_name(raw: &str) -> Result<String, AppError> {
    let Some(stripped) = raw.strip_suffix(".json") else {
        return Err(AppError::bad_request("location must use the .json suffix"));
    };
    Ok(stripped.trim_matches('/').to_string())
}

fn tree_path(name: &str) -> String {
    if name.is_empty() {
        "/".to_string()
    } else {
        format!("/{name}")
    }
}

// GET /{name}.json — JSON read, or SSE subscription when the client asks
// for text/event-stream
pub async fn read_or_subscribe(
    State(state): State<SharedState>,
    UrlPath(raw): UrlPath<String>,
    Query(params): Query<RequestParams>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    authorize(&state, &params)?;
    let name = parse_name(&raw)?;

    let wants_stream = headers
        .get(header::ACCEPT)
        .and_then(|accept| accept.to_str().ok())
        .is_some_and(|accept| accept.contains("text/event-stream"));

    if wants_stream {
        let (id, rx) = state.subscribe(name.clone())?;
        debug!("stream subscriber {id} on {name:?}");
        let stream = EventStream { id, state: Arc::clone(&state), rx };
        let sse = Sse::new(stream).keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(15))
                .text("keep-alive"),
        );
        return Ok(sse.into_response());
    }

    let value = state.read(&name, params.shallow.unwrap_or(false))?;
    Ok(Json(value).into_response())
}

// PUT /{name}.json
pub async fn put(
    State(state): State<SharedState>,
    UrlPath(raw): UrlPath<String>,
    Query(params): Query<RequestParams>,
    Json(data): Json<Value>,
) -> Result<Json<Value>, AppError> {
    authorize(&state, &params)?;
    let name = parse_name(&raw)?;
    state.apply(&Operation::Put {
        path: tree_path(&name),
        value: data.clone(),
    })?;
    Ok(Json(data))
}

// PATCH /{name}.json
pub async fn patch(
    State(state): State<SharedState>,
    UrlPath(raw): UrlPath<String>,
    Query(params): Query<RequestParams>,
    Json(data): Json<Value>,
) -> Result<Json<Value>, AppError> {
    authorize(&state, &params)?;
    let name = parse_name(&raw)?;
    state.apply(&Operation::Patch {
        path: tree_path(&name),
        value: data.clone(),
    })?;
    Ok(Json(data))
}

// POST /{name}.json — append under a generated child key. Honors
// X-HTTP-Method-Override: PATCH for transports without a native PATCH
// verb.
pub async fn post(
    State(state): State<SharedState>,
    UrlPath(raw): UrlPath<String>,
    Query(params): Query<RequestParams>,
    headers: HeaderMap,
    Json(data): Json<Value>,
) -> Result<Json<Value>, AppError> {
    authorize(&state, &params)?;
    let name = parse_name(&raw)?;

    let override_patch = headers
        .get("x-http-method-override")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("PATCH"));
    if override_patch {
        state.apply(&Operation::Patch {
            path: tree_path(&name),
            value: data.clone(),
        })?;
        return Ok(Json(data));
    }

    let key = uuid::Uuid::new_v4().simple().to_string();
    let child = if name.is_empty() {
        key.clone()
    } else {
        format!("{name}/{key}")
    };
    state.apply(&Operation::Put {
        path: tree_path(&child),
        value: data,
    })?;
    Ok(Json(serde_json::json!({ "name": key })))
}

// DELETE /{name}.json
pub async fn delete(
    State(state): State<SharedState>,
    UrlPath(raw): UrlPath<String>,
    Query(params): Query<RequestParams>,
) -> Result<Json<Value>, AppError> {
    authorize(&state, &params)?;
    let name = parse_name(&raw)?;
    state.apply(&Operation::Put {
        path: tree_path(&name),
        value: Value::Null,
    })?;
    Ok(Json(Value::Null))
}

/// Bridges a subscriber's mpsc receiver into an SSE body. Dropping the
/// stream (client disconnect) unregisters the subscriber.
struct EventStream {
    id: u64,
    state: SharedState,
    rx: mpsc::UnboundedReceiver<Operation>,
}

impl Stream for EventStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        this.rx
            .poll_recv(cx)
            .map(|op| op.map(|op| Ok(to_sse_event(op))))
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        debug!("stream subscriber {} gone", self.id);
        self.state.unsubscribe(self.id);
    }
}

fn to_sse_event(op: Operation) -> Event {
    let kind = op.kind();
    let (path, data) = match op {
        Operation::Put { path, value } | Operation::Patch { path, value } => (path, value),
    };
    let body = EventBody { path, data };
    Event::default()
        .event(kind)
        .data(serde_json::to_string(&body).unwrap_or_default())
}
