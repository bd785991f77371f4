//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted request (from http::server, after the policy decision)
//!     → unix.rs (dial engine socket, HTTP/1.1 handshake)
//!     → stream the engine's response back
//! ```
//!
//! # Design Decisions
//! - The engine socket is only ever reached through an allowed decision
//! - Dial failures become 502 responses, never process exits

pub mod unix;

pub use unix::{UnixUpstream, UpstreamError};
