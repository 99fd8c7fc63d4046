//! Scriptable HTTP server for exercising the execution engine end to end.
//!
//! Every request that is not a `/_mock/*` control route is recorded and
//! answered with the next scripted response. With an empty script the server
//! answers `200` with a JSON echo of the request it just recorded.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard},
};

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::debug;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScriptedResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: String,
}

impl ScriptedResponse {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Shared script and request log. Clones share the same underlying state.
#[derive(Clone, Debug, Default)]
pub struct MockState {
    script: Arc<Mutex<VecDeque<ScriptedResponse>>>,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: ScriptedResponse) {
        lock(&self.script).push_back(response);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.recorded).clone()
    }

    fn next(&self) -> Option<ScriptedResponse> {
        lock(&self.script).pop_front()
    }

    fn record(&self, request: RecordedRequest) {
        lock(&self.recorded).push(request);
    }
}

pub fn app(state: MockState) -> Router {
    Router::new()
        .route("/_mock/script", post(push_script))
        .route("/_mock/requests", get(list_requests))
        .fallback(replay)
        .with_state(state)
}

pub async fn run(listener: TcpListener, state: MockState) -> Result<(), std::io::Error> {
    axum::serve(listener, app(state)).await
}

async fn push_script(
    State(state): State<MockState>,
    Json(responses): Json<Vec<ScriptedResponse>>,
) -> StatusCode {
    for response in responses {
        state.push(response);
    }
    StatusCode::NO_CONTENT
}

async fn list_requests(State(state): State<MockState>) -> Json<Vec<RecordedRequest>> {
    Json(state.requests())
}

async fn replay(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let recorded = RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers: headers
            .iter()
            .map(|(n, v)| {
                (
                    n.as_str().to_string(),
                    v.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect(),
        body: String::from_utf8_lossy(&body).into_owned(),
    };
    debug!(%method, %uri, "recorded request");
    state.record(recorded.clone());

    match state.next() {
        Some(scripted) => scripted_response(scripted),
        None => Json(recorded).into_response(),
    }
}

fn scripted_response(scripted: ScriptedResponse) -> Response {
    let Ok(status) = StatusCode::from_u16(scripted.status) else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    let mut response = Response::new(Body::from(scripted.body));
    *response.status_mut() = status;
    for (name, value) in scripted.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            response.headers_mut().append(name, value);
        }
    }
    response
}
