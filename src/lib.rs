//! Docker socket guard library.
//!
//! Mediates HTTP calls to a container-engine API that listens on a local
//! Unix socket. Every request is checked against an ordered allow-list of
//! routes; allowed requests may have their query filters or JSON body
//! validated and rewritten before they reach the socket.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod policy;
pub mod routing;

pub use config::GuardConfig;
pub use http::HttpServer;
pub use policy::{Decision, Director};
