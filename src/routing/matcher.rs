//! Route matching logic.
//!
//! # Responsibilities
//! - Match the request method (exact, or `*` for any)
//! - Search the route pattern in the request path
//! - Strip the API version prefix (`/v1.41`) before pattern matching
//!
//! # Design Decisions
//! - Method matching is exact and case-sensitive
//! - Patterns are unanchored searches; anchors must be written explicitly
//! - Regexes are compiled once, when the route table is built

use axum::http::Method;
use regex::Regex;

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the method and (version-stripped) path match.
    fn matches(&self, method: &Method, path: &str) -> bool;
}

/// Matches the request method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodMatcher {
    Any,
    Exact(String),
}

impl MethodMatcher {
    /// `*` matches every method; anything else must equal the method exactly.
    pub fn new(method: &str) -> Self {
        if method == "*" {
            MethodMatcher::Any
        } else {
            MethodMatcher::Exact(method.to_string())
        }
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, method: &Method, _path: &str) -> bool {
        match self {
            MethodMatcher::Any => true,
            MethodMatcher::Exact(expected) => expected == method.as_str(),
        }
    }
}

/// Searches a regex anywhere in the path.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    pattern: Regex,
}

impl PatternMatcher {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}

impl Matcher for PatternMatcher {
    fn matches(&self, _method: &Method, path: &str) -> bool {
        self.pattern.is_match(path)
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, method: &Method, path: &str) -> bool {
        self.matchers.iter().all(|m| m.matches(method, path))
    }
}

/// Removes a leading `/v<major>.<minor>` segment from request paths.
#[derive(Debug, Clone)]
pub struct VersionPrefix {
    prefix: Regex,
}

impl VersionPrefix {
    pub fn new() -> Self {
        Self {
            prefix: Regex::new(r"^/v\d+\.\d+\b").expect("version prefix pattern is valid"),
        }
    }

    /// The path as route patterns see it.
    pub fn strip<'a>(&self, path: &'a str) -> &'a str {
        match self.prefix.find(path) {
            Some(m) => &path[m.end()..],
            None => path,
        }
    }
}

impl Default for VersionPrefix {
    fn default() -> Self {
        Self::new()
    }
}
