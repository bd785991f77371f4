//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Pick the default filter from the `--debug` flag
//!
//! # Design Decisions
//! - `RUST_LOG` always wins over the built-in defaults
//! - Debug level adds per-check match traces and pretty-printed bodies

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter directives for the given verbosity.
pub fn default_directives(debug: bool) -> &'static str {
    if debug {
        "socket_guard=debug,tower_http=debug"
    } else {
        "socket_guard=info,tower_http=info"
    }
}

/// Install the global subscriber. Call once, at startup.
pub fn init_logging(debug: bool) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directives(debug).into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
