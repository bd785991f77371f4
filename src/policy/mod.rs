//! Policy engine subsystem.
//!
//! # Data Flow
//! ```text
//! director.rs (one call per request)
//!     → routing::RouteTable (which rule applies)
//!     → query.rs + value.rs (param checks)
//!     → filters.rs (normalize, check, inject list filters)
//!     → nested.rs + value.rs (JSON body checks)
//!     → Decision: Forward / ForwardRewritten / Reject
//! ```
//!
//! # Design Decisions
//! - Stateless and synchronous apart from buffering the body
//! - Decoded JSON is a tagged `serde_json::Value`; matching dispatches on it
//! - Every rejection is a single `{"message": ...}` JSON object

pub mod director;
pub mod error;
pub mod filters;
pub mod nested;
pub mod query;
pub mod value;

pub use director::{Decision, Director, DirectorSettings, Upstream};
pub use error::PolicyError;
pub use filters::{Filters, FILTERS_PARAM};
pub use nested::find_nested;
pub use value::{is_allowed, AllowSpec, AllowSpecError, MatchMode};
