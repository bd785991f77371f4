//! Route lookup.
//!
//! # Responsibilities
//! - Compile configured routes (patterns and allow-lists)
//! - Look up the rule governing a request
//! - Let health/introspection calls through regardless of configuration
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) ordered scan; the first matching route wins, so specific
//!   patterns must be listed before broad ones
//! - Explicit NoMatch rather than silent default

use axum::http::Method;
use serde_json::Value;

use crate::config::{ConfigError, GuardConfig, RouteConfig};
use crate::policy::AllowSpec;
use crate::routing::matcher::{AndMatcher, Matcher, MethodMatcher, PatternMatcher, VersionPrefix};

/// Query parameter check.
#[derive(Debug, Clone)]
pub struct ParamRule {
    pub param: String,
    pub allowed: Vec<AllowSpec>,
}

/// JSON body check. `key` is never empty.
#[derive(Debug, Clone)]
pub struct JsonRule {
    pub key: Vec<String>,
    pub allowed: Vec<AllowSpec>,
}

impl JsonRule {
    /// Dotted form used in logs and rejection messages.
    pub fn key_path(&self) -> String {
        self.key.join(".")
    }
}

/// Check on values a client put into a list filter.
#[derive(Debug, Clone)]
pub struct FilterCheckRule {
    pub filter_key: String,
    pub allowed: Vec<AllowSpec>,
}

/// Values always appended to a list filter.
#[derive(Debug, Clone)]
pub struct FilterAppendRule {
    pub filter_key: String,
    pub values: Vec<Value>,
}

/// A compiled allow rule.
#[derive(Debug)]
pub struct Route {
    method: MethodMatcher,
    pattern: PatternMatcher,
    pub check_param: Vec<ParamRule>,
    pub check_json: Vec<JsonRule>,
    pub check_filter: Vec<FilterCheckRule>,
    pub append_filter: Vec<FilterAppendRule>,
}

impl Route {
    /// Compile a configured route. `index` is only used in error messages.
    pub fn compile(index: usize, config: &RouteConfig) -> Result<Self, ConfigError> {
        let pattern = PatternMatcher::new(&config.pattern).map_err(|source| ConfigError::Pattern {
            route: index,
            pattern: config.pattern.clone(),
            source,
        })?;

        let rule_error = |rule: String| {
            move |source| ConfigError::Rule {
                route: index,
                rule,
                source,
            }
        };

        let check_param = config
            .check_param
            .iter()
            .map(|c| -> Result<ParamRule, ConfigError> {
                Ok(ParamRule {
                    param: c.param.clone(),
                    allowed: AllowSpec::compile_all(&c.allowed_values)
                        .map_err(rule_error(format!("check_param {}", c.param)))?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let check_json = config
            .check_json
            .iter()
            .map(|c| -> Result<JsonRule, ConfigError> {
                Ok(JsonRule {
                    key: c.key.clone(),
                    allowed: AllowSpec::compile_all(&c.allowed_values)
                        .map_err(rule_error(format!("check_json {}", c.key.join("."))))?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let check_filter = config
            .check_filter
            .iter()
            .map(|c| -> Result<FilterCheckRule, ConfigError> {
                Ok(FilterCheckRule {
                    filter_key: c.filter_key.clone(),
                    allowed: AllowSpec::compile_all(&c.allowed_values)
                        .map_err(rule_error(format!("check_filter {}", c.filter_key)))?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let append_filter = config
            .append_filter
            .iter()
            .map(|a| FilterAppendRule {
                filter_key: a.filter_key.clone(),
                values: a.values.clone(),
            })
            .collect();

        Ok(Self {
            method: MethodMatcher::new(&config.method),
            pattern,
            check_param,
            check_json,
            check_filter,
            append_filter,
        })
    }

    /// Route without request checks.
    pub fn allow(method: &str, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            method: MethodMatcher::new(method),
            pattern: PatternMatcher::new(pattern)?,
            check_param: Vec::new(),
            check_json: Vec::new(),
            check_filter: Vec::new(),
            append_filter: Vec::new(),
        })
    }

    pub fn method(&self) -> &MethodMatcher {
        &self.method
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// True when the route only decides reachability.
    pub fn is_passthrough(&self) -> bool {
        self.check_param.is_empty()
            && self.check_json.is_empty()
            && self.check_filter.is_empty()
            && self.append_filter.is_empty()
    }

    /// True when filters have to be decoded for this route.
    pub fn uses_filters(&self) -> bool {
        !self.check_filter.is_empty() || !self.append_filter.is_empty()
    }
}

impl Matcher for Route {
    fn matches(&self, method: &Method, path: &str) -> bool {
        self.method.matches(method, path) && self.pattern.matches(method, path)
    }
}

/// Result of a route lookup.
#[derive(Debug)]
pub enum RouteMatch<'a> {
    /// Built-in health/introspection route; always forwarded untouched.
    Bypass,
    /// First configured route matching the request.
    Route(&'a Route),
    /// Nothing matched; the request is not allowed.
    NoMatch,
}

/// Ordered, immutable allow-list.
#[derive(Debug)]
pub struct RouteTable {
    routes: Vec<Route>,
    bypass: Vec<AndMatcher>,
    version: VersionPrefix,
}

impl RouteTable {
    /// Compile every configured route, in configuration order.
    pub fn from_config(config: &GuardConfig) -> Result<Self, ConfigError> {
        let routes = config
            .routes_allowed
            .iter()
            .enumerate()
            .map(|(index, route)| Route::compile(index, route))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(routes))
    }

    pub fn new(routes: Vec<Route>) -> Self {
        Self {
            routes,
            bypass: builtin_bypass(),
            version: VersionPrefix::new(),
        }
    }

    /// Find the rule governing `method path`.
    pub fn lookup(&self, method: &Method, path: &str) -> RouteMatch<'_> {
        let path = self.version.strip(path);

        if self.bypass.iter().any(|m| m.matches(method, path)) {
            return RouteMatch::Bypass;
        }

        match self.routes.iter().find(|route| route.matches(method, path)) {
            Some(route) => RouteMatch::Route(route),
            None => RouteMatch::NoMatch,
        }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn builtin_bypass() -> Vec<AndMatcher> {
    let rule = |method: &str, pattern: &str| {
        AndMatcher::new(vec![
            Box::new(MethodMatcher::new(method)),
            Box::new(PatternMatcher::new(pattern).expect("built-in pattern is valid")),
        ])
    };
    vec![
        rule("GET", r"^/(_ping|version|info)$"),
        rule("HEAD", r"^/_ping$"),
    ]
}
