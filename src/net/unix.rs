//! Upstream connections over the engine's Unix socket.
//!
//! # Responsibilities
//! - Dial the backend socket for every forwarded request
//! - Speak HTTP/1.1 over the connection (hyper client connection)
//! - Map transport failures to 502 responses
//! - Refuse connection upgrades (attach/exec hijacking) with 501
//!
//! # Design Decisions
//! - One connection per request; the engine socket is local and cheap to dial
//! - Responses are streamed back without buffering
//! - Requests are sent in origin-form; the socket has no authority

use std::future::Future;
use std::path::{Path, PathBuf};

use axum::{
    body::Body,
    http::{header, uri::PathAndQuery, HeaderValue, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use hyper_util::rt::TokioIo;
use serde_json::json;
use thiserror::Error;
use tokio::net::UnixStream;

use crate::policy::Upstream;

/// Error talking to the backend socket.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("failed to dial {}: {source}", path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("upstream handshake failed: {0}")]
    Handshake(#[source] hyper::Error),

    #[error("upstream request failed: {0}")]
    Request(#[source] hyper::Error),

    #[error("invalid upstream request: {0}")]
    InvalidRequest(#[from] axum::http::Error),

    #[error("connection upgrade to {0:?} is not supported")]
    UpgradeUnsupported(String),
}

impl UpstreamError {
    pub fn status(&self) -> StatusCode {
        match self {
            UpstreamError::UpgradeUnsupported(_) => StatusCode::NOT_IMPLEMENTED,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Forwards requests to an HTTP server listening on a Unix socket.
#[derive(Debug, Clone)]
pub struct UnixUpstream {
    socket_path: PathBuf,
}

impl UnixUpstream {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Send one request over a fresh connection.
    pub async fn send(&self, request: Request<Body>) -> Result<Response, UpstreamError> {
        if let Some(upgrade) = request.headers().get(header::UPGRADE) {
            return Err(UpstreamError::UpgradeUnsupported(
                String::from_utf8_lossy(upgrade.as_bytes()).into_owned(),
            ));
        }

        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|source| UpstreamError::Connect {
                path: self.socket_path.clone(),
                source,
            })?;
        tracing::trace!(socket = %self.socket_path.display(), "Dialed upstream");

        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(UpstreamError::Handshake)?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(error = %e, "Upstream connection closed with error");
            }
        });

        let request = into_origin_form(request)?;
        let response = sender
            .send_request(request)
            .await
            .map_err(UpstreamError::Request)?;

        Ok(response.map(Body::new))
    }
}

impl Upstream for UnixUpstream {
    fn forward(&self, request: Request<Body>) -> impl Future<Output = Response> + Send {
        async move {
            match self.send(request).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(error = %e, "Upstream error");
                    (
                        e.status(),
                        Json(json!({ "message": e.to_string() })),
                    )
                        .into_response()
                }
            }
        }
    }
}

fn into_origin_form(request: Request<Body>) -> Result<Request<Body>, UpstreamError> {
    let (mut parts, body) = request.into_parts();

    let path_and_query = parts
        .uri
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));
    parts.uri = Uri::builder().path_and_query(path_and_query).build()?;

    if !parts.headers.contains_key(header::HOST) {
        parts.headers.insert(header::HOST, HeaderValue::from_static("localhost"));
    }

    Ok(Request::from_parts(parts, body))
}
