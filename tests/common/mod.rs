//! Mock Confluence REST API for integration tests.
//!
//! Serves a fixed set of pages over the three content endpoints and
//! records what each request carried.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

pub const EMAIL: &str = "bot@acme.com";
pub const TOKEN: &str = "s3cret-token";

/// One recorded request.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
    pub accept: Option<String>,
    pub content_type: Option<String>,
}

/// How the mock answers.
#[derive(Clone, Default)]
pub struct Behavior {
    /// Answer every request with this status and body instead of data.
    pub failure: Option<(StatusCode, String)>,
    /// Answer 200 with a body that is not the expected JSON.
    pub malformed: bool,
    /// Sleep before answering.
    pub delay: Option<Duration>,
}

#[derive(Clone)]
pub struct MockState {
    pages: Arc<Vec<Value>>,
    behavior: Behavior,
    pub requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockState {
    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

pub fn page_json(id: &str, storage: &str, view: &str, created_at: &str) -> Value {
    json!({
        "id": id,
        "type": "page",
        "status": "current",
        "title": format!("Page {}", id),
        "space": { "id": 98304, "key": "ENG", "name": "Engineering" },
        "body": {
            "storage": { "value": storage, "representation": "storage" },
            "view": { "value": view, "representation": "view" }
        },
        "version": { "number": 3, "when": "a while ago", "createdAt": created_at },
        "_links": {
            "webui": format!("/spaces/ENG/pages/{}", id),
            "self": format!("https://acme.atlassian.net/wiki/rest/api/content/{}", id)
        }
    })
}

async fn record(
    state: &MockState,
    path: String,
    query: HashMap<String, String>,
    headers: &HeaderMap,
) -> Option<Response> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    state.requests.lock().unwrap().push(Recorded {
        path,
        query,
        authorization: header("authorization"),
        accept: header("accept"),
        content_type: header("content-type"),
    });

    if let Some(delay) = state.behavior.delay {
        tokio::time::sleep(delay).await;
    }
    if let Some((status, body)) = &state.behavior.failure {
        return Some((*status, body.clone()).into_response());
    }
    if state.behavior.malformed {
        return Some((StatusCode::OK, "<html>login</html>").into_response());
    }
    None
}

async fn list_content(
    State(state): State<MockState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if let Some(resp) = record(&state, "/wiki/rest/api/content".into(), query, &headers).await {
        return resp;
    }
    Json(json!({ "results": state.pages.as_ref(), "start": 0, "size": state.pages.len() }))
        .into_response()
}

async fn get_content(
    State(state): State<MockState>,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if let Some(resp) = record(&state, uri.path().to_string(), query, &headers).await {
        return resp;
    }
    match state.pages.iter().find(|p| p["id"] == id.as_str()) {
        Some(page) => Json(page.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            format!(r#"{{"statusCode":404,"message":"No content found with id {}"}}"#, id),
        )
            .into_response(),
    }
}

async fn search(
    State(state): State<MockState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if let Some(resp) = record(&state, "/wiki/rest/api/search".into(), query, &headers).await {
        return resp;
    }
    let results: Vec<Value> = state
        .pages
        .iter()
        .map(|page| {
            json!({
                "content": page,
                "title": "@@@hl@@@highlighted@@@endhl@@@ title",
                "excerpt": "an excerpt",
                "url": "/spaces/ENG/pages/elsewhere",
                "resultGlobalContainer": { "title": "Engineering", "displayUrl": "/spaces/ENG" }
            })
        })
        .collect();
    Json(json!({
        "results": results,
        "start": 0,
        "limit": 25,
        "size": state.pages.len()
    }))
    .into_response()
}

/// Start the mock on an ephemeral port. Returns its base URL and state.
pub async fn spawn(pages: Vec<Value>, behavior: Behavior) -> (String, MockState) {
    let state = MockState {
        pages: Arc::new(pages),
        behavior,
        requests: Arc::new(Mutex::new(Vec::new())),
    };

    let app = Router::new()
        .route("/wiki/rest/api/content", get(list_content))
        .route("/wiki/rest/api/content/{id}", get(get_content))
        .route("/wiki/rest/api/search", get(search))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), state)
}
