//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → matcher.rs (strip /vX.Y, evaluate method + pattern)
//!     → router.rs (bypass routes, then ordered table scan)
//!     → Return: Bypass, matched Route, or NoMatch
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Compile patterns and allow-lists
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Deterministic: same input always matches same route
//! - First match wins (configuration order)

pub mod matcher;
pub mod router;

pub use matcher::{Matcher, MethodMatcher, PatternMatcher, VersionPrefix};
pub use router::{FilterAppendRule, FilterCheckRule, JsonRule, ParamRule, Route, RouteMatch, RouteTable};
