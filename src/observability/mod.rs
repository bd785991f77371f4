//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Director / transport produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (decision and request counters, latency histogram)
//!
//! Consumers:
//!     → stdout (operators)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Log output is a side channel; nothing here reaches the client
//! - Metrics are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
