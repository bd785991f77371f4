//! List-filter normalization.
//!
//! The engine API carries list filters as a JSON object in the `filters`
//! query parameter. Clients encode each list in one of two shapes:
//!
//! ```text
//! {"label": {"foo": true}}     map of value -> true (docker CLI)
//! {"label": ["foo"]}           plain array (compose and most SDKs)
//! ```
//!
//! Both are read into the canonical array form before rules run, and the
//! canonical form is what gets written back.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::policy::error::PolicyError;

/// Name of the query parameter holding list filters.
pub const FILTERS_PARAM: &str = "filters";

/// Filters in canonical form: filter key to ordered list of scalar values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    entries: BTreeMap<String, Vec<Value>>,
}

impl Filters {
    /// Decode a raw `filters` parameter value.
    pub fn parse(raw: &str) -> Result<Self, PolicyError> {
        let decoded: BTreeMap<String, Value> =
            serde_json::from_str(raw).map_err(|e| PolicyError::MalformedInput(e.to_string()))?;

        let mut entries = BTreeMap::new();
        for (key, value) in decoded {
            let values = match value {
                Value::Object(set) => set.into_iter().map(|(member, _)| Value::String(member)).collect(),
                Value::Array(items) => {
                    if let Some(item) = items.iter().find(|item| !is_scalar(item)) {
                        return Err(PolicyError::MalformedInput(format!(
                            "Unhandled value {item} in filter {key}"
                        )));
                    }
                    items
                }
                other => {
                    return Err(PolicyError::MalformedInput(format!(
                        "Unhandled filter type of {} for filter {key}",
                        kind_name(&other)
                    )));
                }
            };
            entries.insert(key, values);
        }
        Ok(Self { entries })
    }

    /// Values currently held for `key`.
    pub fn values(&self, key: &str) -> &[Value] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Append `values` to `key`, creating the key when absent. Values already
    /// present are not deduplicated.
    pub fn append(&mut self, key: &str, values: &[Value]) {
        let entry = self.entries.entry(key.to_string()).or_default();
        for value in values {
            tracing::info!(filter = key, value = %value, "Adding value to filter");
            entry.push(value.clone());
        }
    }

    /// Encode back to the JSON carried in the query string.
    pub fn encode(&self) -> Result<String, PolicyError> {
        serde_json::to_string(&self.entries).map_err(|e| PolicyError::Encoding(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
