//! Configuration schema definitions.
//!
//! This module defines the route file structure for the guard.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::policy::MatchMode;

/// Root configuration: the allow-list and engine settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Allowed routes, in precedence order (first match wins).
    pub routes_allowed: Vec<RouteConfig>,

    /// How the value matcher treats allow-lists mixing value types.
    pub match_mode: MatchMode,

    /// Upper bound for buffering a JSON body that has to be inspected.
    pub max_body_bytes: usize,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            routes_allowed: Vec::new(),
            match_mode: MatchMode::default(),
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// A single allow rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// HTTP method to match, or `*` for any.
    pub method: String,

    /// Regex searched against the path with the API version prefix removed.
    pub pattern: String,

    #[serde(default)]
    pub check_param: Vec<CheckParamConfig>,

    #[serde(default)]
    pub check_json: Vec<CheckJsonConfig>,

    #[serde(default)]
    pub check_filter: Vec<CheckFilterConfig>,

    #[serde(default)]
    pub append_filter: Vec<AppendFilterConfig>,
}

impl RouteConfig {
    /// Convenience constructor for a route without request checks.
    pub fn new(method: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            pattern: pattern.into(),
            check_param: Vec::new(),
            check_json: Vec::new(),
            check_filter: Vec::new(),
            append_filter: Vec::new(),
        }
    }
}

/// Query parameter whose value must match the allow-list.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckParamConfig {
    pub param: String,
    pub allowed_values: Vec<Value>,
}

/// Key path inside a JSON body whose value must match the allow-list.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckJsonConfig {
    pub key: Vec<String>,
    pub allowed_values: Vec<Value>,
}

/// Filter whose client-supplied values must match the allow-list.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckFilterConfig {
    pub filter_key: String,
    pub allowed_values: Vec<Value>,
}

/// Values that are always appended to a list filter.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppendFilterConfig {
    pub filter_key: String,
    pub values: Vec<Value>,
}
