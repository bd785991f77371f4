//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! route file (JSON/TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GuardConfig (validated)
//!     → routing::RouteTable (compiled, immutable, shared via Arc)
//! ```
//!
//! # Design Decisions
//! - Loaded once at startup; there is no reload path
//! - Any error is fatal: the process does not start with a partial table
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError, ConfigFormat};
pub use schema::{
    AppendFilterConfig, CheckFilterConfig, CheckJsonConfig, CheckParamConfig, GuardConfig,
    RouteConfig,
};
pub use validation::ValidationError;
