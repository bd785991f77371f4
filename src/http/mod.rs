//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → policy::Director (allow, rewrite or reject)
//!     → net::unix (forward to the engine socket)
//!     → Send response to client
//! ```

pub mod request;
pub mod server;

pub use request::{decoded_path, is_json_content, UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
