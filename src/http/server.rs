//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with a catch-all handler
//! - Wire up middleware (tracing, request ID)
//! - Bind server to listener
//! - Hand every request to the policy director
//! - Graceful shutdown

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, Request},
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::http::request::{UuidRequestId, X_REQUEST_ID};
use crate::observability::metrics;
use crate::policy::{Director, Upstream};

/// Application state injected into handlers.
pub struct AppState<U> {
    pub director: Arc<Director>,
    pub upstream: Arc<U>,
}

impl<U> Clone for AppState<U> {
    fn clone(&self) -> Self {
        Self {
            director: Arc::clone(&self.director),
            upstream: Arc::clone(&self.upstream),
        }
    }
}

/// HTTP server for the guard.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server deciding with `director` and forwarding
    /// accepted requests to `upstream`.
    pub fn new<U: Upstream>(director: Arc<Director>, upstream: U) -> Self {
        let state = AppState {
            director,
            upstream: Arc::new(upstream),
        };
        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router<U: Upstream>(state: AppState<U>) -> Router {
        let request_id = HeaderName::from_static(X_REQUEST_ID);
        Router::new()
            .route("/{*path}", any(proxy_handler::<U>))
            .route("/", any(proxy_handler::<U>))
            .with_state(state)
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(request_id, UuidRequestId))
    }

    /// The configured router, for serving it some other way (tests).
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Run the server until `shutdown` completes, then drain in-flight requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main proxy handler: policy decision, then forward or reject.
async fn proxy_handler<U: Upstream>(State(state): State<AppState<U>>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let method = request.method().to_string();

    tracing::debug!(
        method = %method,
        uri = %request.uri(),
        "Directing request"
    );

    let response = state.director.direct(request, state.upstream.as_ref()).await;

    metrics::record_request(&method, response.status().as_u16(), start_time);
    response
}
