//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Reject allow-list values the matcher cannot compare
//! - Check rule fields are usable (non-empty names and key paths)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - Regex compilation happens when the route table is built

use serde_json::Value;
use thiserror::Error;

use crate::config::schema::{GuardConfig, RouteConfig};

/// A single semantic problem in the route file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("route {route}: method must be '*' or an uppercase HTTP method, got {method:?}")]
    InvalidMethod { route: usize, method: String },

    #[error("route {route}: check_param[{rule}] has an empty param name")]
    EmptyParam { route: usize, rule: usize },

    #[error("route {route}: check_json[{rule}] key path is empty or has an empty segment")]
    EmptyKeyPath { route: usize, rule: usize },

    #[error("route {route}: {field}[{rule}] has an empty filter_key")]
    EmptyFilterKey {
        route: usize,
        field: &'static str,
        rule: usize,
    },

    #[error("route {route}: {field}[{rule}] contains unsupported allowed value {value}")]
    UnsupportedAllowedValue {
        route: usize,
        field: &'static str,
        rule: usize,
        value: String,
    },

    #[error("route {route}: append_filter[{rule}] value {value} is not a string, number or boolean")]
    NonScalarFilterValue {
        route: usize,
        rule: usize,
        value: String,
    },

    #[error("max_body_bytes must be greater than zero")]
    ZeroBodyLimit,
}

/// Validate the whole configuration, collecting every problem found.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    for (index, route) in config.routes_allowed.iter().enumerate() {
        validate_route(index, route, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_route(route_index: usize, route: &RouteConfig, errors: &mut Vec<ValidationError>) {
    if !is_valid_method(&route.method) {
        errors.push(ValidationError::InvalidMethod {
            route: route_index,
            method: route.method.clone(),
        });
    }

    for (rule, check) in route.check_param.iter().enumerate() {
        if check.param.is_empty() {
            errors.push(ValidationError::EmptyParam { route: route_index, rule });
        }
        check_allowed_values(route_index, "check_param", rule, &check.allowed_values, errors);
    }

    for (rule, check) in route.check_json.iter().enumerate() {
        if check.key.is_empty() || check.key.iter().any(String::is_empty) {
            errors.push(ValidationError::EmptyKeyPath { route: route_index, rule });
        }
        check_allowed_values(route_index, "check_json", rule, &check.allowed_values, errors);
    }

    for (rule, check) in route.check_filter.iter().enumerate() {
        if check.filter_key.is_empty() {
            errors.push(ValidationError::EmptyFilterKey {
                route: route_index,
                field: "check_filter",
                rule,
            });
        }
        check_allowed_values(route_index, "check_filter", rule, &check.allowed_values, errors);
    }

    for (rule, append) in route.append_filter.iter().enumerate() {
        if append.filter_key.is_empty() {
            errors.push(ValidationError::EmptyFilterKey {
                route: route_index,
                field: "append_filter",
                rule,
            });
        }
        for value in &append.values {
            if !matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_)) {
                errors.push(ValidationError::NonScalarFilterValue {
                    route: route_index,
                    rule,
                    value: value.to_string(),
                });
            }
        }
    }
}

fn is_valid_method(method: &str) -> bool {
    if method == "*" {
        return true;
    }
    !method.is_empty() && method.bytes().all(|b| b.is_ascii_uppercase())
}

fn check_allowed_values(
    route: usize,
    field: &'static str,
    rule: usize,
    values: &[Value],
    errors: &mut Vec<ValidationError>,
) {
    for value in values {
        if !is_comparable(value) {
            errors.push(ValidationError::UnsupportedAllowedValue {
                route,
                field,
                rule,
                value: value.to_string(),
            });
        }
    }
}

/// Null and arrays have no allow-list semantics, at any depth.
fn is_comparable(value: &Value) -> bool {
    match value {
        Value::Bool(_) | Value::Number(_) | Value::String(_) => true,
        Value::Object(fields) => fields.values().all(is_comparable),
        Value::Null | Value::Array(_) => false,
    }
}
