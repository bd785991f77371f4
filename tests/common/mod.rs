//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, Method, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::UnixListener;

use socket_guard::config::{parse_config, ConfigFormat};
use socket_guard::policy::{Director, Upstream};

/// A request as seen by an upstream.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Upstream that records every forwarded request and answers 200.
#[derive(Debug, Clone, Default)]
pub struct RecordingUpstream {
    seen: Arc<Mutex<Vec<Recorded>>>,
}

impl RecordingUpstream {
    pub fn requests(&self) -> Vec<Recorded> {
        self.seen.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Recorded> {
        self.seen.lock().unwrap().last().cloned()
    }
}

impl Upstream for RecordingUpstream {
    fn forward(&self, request: Request<Body>) -> impl std::future::Future<Output = Response> + Send {
        let seen = Arc::clone(&self.seen);
        async move {
            let (parts, body) = request.into_parts();
            let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
            seen.lock().unwrap().push(Recorded {
                method: parts.method,
                uri: parts.uri,
                headers: parts.headers,
                body,
            });
            StatusCode::OK.into_response()
        }
    }
}

/// Build a director from an inline JSON route file.
pub fn director(config: Value) -> Director {
    let config = parse_config(&config.to_string(), ConfigFormat::Json).unwrap();
    Director::from_config(&config).unwrap()
}

/// Echo back what the engine received, so tests can see the forwarded request.
async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Value> {
    let content_length = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "content_length": content_length,
        "body": String::from_utf8_lossy(&body),
    }))
}

/// A fake engine listening on a Unix socket in a temporary directory.
pub struct MockEngine {
    dir: TempDir,
}

impl MockEngine {
    pub fn socket_path(&self) -> PathBuf {
        socket_in(self.dir.path())
    }
}

fn socket_in(dir: &Path) -> PathBuf {
    dir.join("engine.sock")
}

/// Start the echo engine. It stops when the runtime shuts down.
pub async fn start_mock_engine() -> MockEngine {
    let dir = tempfile::tempdir().unwrap();
    let listener = UnixListener::bind(socket_in(dir.path())).unwrap();
    let app = Router::new()
        .route("/", any(echo))
        .route("/{*path}", any(echo));

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockEngine { dir }
}
