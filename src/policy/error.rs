//! Policy rejections.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Why a request was refused. The `Display` output is the exact message
/// returned to the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("{method} {path} Endpoint not allowed")]
    RouteNotAllowed { method: String, path: String },

    #[error("Found forbidden value: {value} for param {param}")]
    ForbiddenParam { value: String, param: String },

    #[error("Found forbidden value: {value} for key {key}")]
    ForbiddenKey { value: String, key: String },

    #[error("Found forbidden value: {value} for filter {filter}")]
    ForbiddenFilter { value: String, filter: String },

    #[error("{0}")]
    MalformedInput(String),

    #[error("{0}")]
    Encoding(String),
}

impl PolicyError {
    pub fn status(&self) -> StatusCode {
        match self {
            PolicyError::RouteNotAllowed { .. } => StatusCode::FORBIDDEN,
            PolicyError::ForbiddenParam { .. }
            | PolicyError::ForbiddenKey { .. }
            | PolicyError::ForbiddenFilter { .. } => StatusCode::UNAUTHORIZED,
            PolicyError::MalformedInput(_) | PolicyError::Encoding(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for PolicyError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::warn!(status = %status, error = %self, "Handler returned error");
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}
