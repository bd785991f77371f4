//! Allow-list values and the type-dispatched value matcher.
//!
//! An allow-list is a disjunction of [`AllowSpec`] candidates. A decoded
//! JSON value is only ever compared with candidates of the same kind:
//!
//! | value   | candidate        | comparison                      |
//! |---------|------------------|---------------------------------|
//! | bool    | `Bool`           | equality                        |
//! | number  | `Number`         | `f64` equality, no epsilon      |
//! | string  | `Pattern`        | unanchored regex search         |
//! | object  | `Object`         | shared keys match recursively   |
//!
//! Null and arrays have no candidate kind and never match.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Object candidates nested deeper than this never match.
pub const MAX_MATCH_DEPTH: usize = 32;

/// How a type mismatch inside an allow-list is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// The first candidate whose kind differs from the value rejects the
    /// whole list, even if a later candidate would match.
    #[default]
    Strict,
    /// Candidates of another kind are skipped.
    Lenient,
}

/// Error compiling a configured allow-list value.
#[derive(Debug, Error)]
pub enum AllowSpecError {
    #[error("{0} values are not supported in an allow-list")]
    Unsupported(&'static str),

    #[error("invalid allowed pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A compiled allow-list candidate.
#[derive(Debug, Clone)]
pub enum AllowSpec {
    Bool(bool),
    Number(f64),
    Pattern(Regex),
    Object(BTreeMap<String, AllowSpec>),
}

impl AllowSpec {
    /// Compile a configured value. Strings become regexes here so a bad
    /// pattern fails at startup instead of on the first request.
    pub fn compile(value: &Value) -> Result<Self, AllowSpecError> {
        match value {
            Value::Bool(b) => Ok(AllowSpec::Bool(*b)),
            Value::Number(n) => n
                .as_f64()
                .map(AllowSpec::Number)
                .ok_or(AllowSpecError::Unsupported("non-finite number")),
            Value::String(pattern) => Regex::new(pattern)
                .map(AllowSpec::Pattern)
                .map_err(|source| AllowSpecError::Pattern {
                    pattern: pattern.clone(),
                    source,
                }),
            Value::Object(fields) => fields
                .iter()
                .map(|(key, value)| Ok((key.clone(), AllowSpec::compile(value)?)))
                .collect::<Result<_, _>>()
                .map(AllowSpec::Object),
            Value::Null => Err(AllowSpecError::Unsupported("null")),
            Value::Array(_) => Err(AllowSpecError::Unsupported("array")),
        }
    }

    /// Compile a whole allow-list.
    pub fn compile_all(values: &[Value]) -> Result<Vec<Self>, AllowSpecError> {
        values.iter().map(AllowSpec::compile).collect()
    }

    /// Whether this candidate can be compared with `value` at all.
    pub fn same_kind(&self, value: &Value) -> bool {
        match self {
            AllowSpec::Bool(_) => value.is_boolean(),
            AllowSpec::Number(_) => value.is_number(),
            AllowSpec::Pattern(_) => value.is_string(),
            AllowSpec::Object(_) => value.is_object(),
        }
    }

    fn matches(&self, value: &Value, depth: usize) -> bool {
        match self {
            AllowSpec::Bool(allowed) => {
                let Some(actual) = value.as_bool() else {
                    return false;
                };
                tracing::trace!(actual, allowed, "Check allowed bool");
                actual == *allowed
            }
            AllowSpec::Number(allowed) => {
                let Some(actual) = value.as_f64() else {
                    return false;
                };
                tracing::trace!(actual, allowed, "Check allowed number");
                actual == *allowed
            }
            AllowSpec::Pattern(pattern) => {
                let Some(actual) = value.as_str() else {
                    return false;
                };
                tracing::trace!(actual, pattern = pattern.as_str(), "Check allowed string");
                pattern.is_match(actual)
            }
            AllowSpec::Object(fields) => {
                let Some(actual) = value.as_object() else {
                    return false;
                };
                if depth >= MAX_MATCH_DEPTH {
                    tracing::debug!(depth, "Allowed object nested too deep, not allowed");
                    return false;
                }
                // Keys missing on either side are unconstrained.
                fields.iter().all(|(key, spec)| match actual.get(key) {
                    None => true,
                    Some(sub) if spec.same_kind(sub) => spec.matches(sub, depth + 1),
                    Some(_) => {
                        tracing::trace!(key = key.as_str(), "Types do not match, not allowed");
                        false
                    }
                })
            }
        }
    }
}

/// Is `value` permitted by any candidate of `allowed`?
pub fn is_allowed(value: &Value, allowed: &[AllowSpec], mode: MatchMode) -> bool {
    for candidate in allowed {
        if !candidate.same_kind(value) {
            match mode {
                MatchMode::Strict => return false,
                MatchMode::Lenient => continue,
            }
        }
        if candidate.matches(value, 0) {
            return true;
        }
    }
    false
}

/// Render a value the way rejection messages show it: strings verbatim,
/// everything else as compact JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
