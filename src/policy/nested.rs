//! Nested key lookup inside decoded JSON documents.
//!
//! The last segment of a key path must name a key exactly. Every earlier
//! segment only adds one level of object nesting: the search descends into
//! every child object regardless of its key, so `["TaskTemplate", "Image"]`
//! finds `Image` in any direct child object of the root. Arrays are never
//! descended into.

use serde_json::{Map, Value};

/// Key paths longer than this are never resolved.
pub const MAX_KEY_DEPTH: usize = 64;

/// Depth-first search for `path` in `doc`.
///
/// Returns `None` when the path does not resolve; callers treat that as
/// "rule does not apply", not as an error.
pub fn find_nested<'a, S: AsRef<str>>(doc: &'a Map<String, Value>, path: &[S]) -> Option<&'a Value> {
    if path.len() > MAX_KEY_DEPTH {
        return None;
    }
    find_at(doc, path)
}

fn find_at<'a, S: AsRef<str>>(doc: &'a Map<String, Value>, path: &[S]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    if rest.is_empty() {
        return doc.get(first.as_ref());
    }
    doc.values()
        .filter_map(Value::as_object)
        .find_map(|child| find_at(child, rest))
}
