//! Per-request policy decisions.
//!
//! # Data Flow
//! ```text
//! Request
//!     → RouteTable::lookup (bypass / first match / no match)
//!     → param checks              → 401 on forbidden value
//!     → filter checks + injection → 400 malformed, 401 forbidden
//!     → JSON body checks          → 400 malformed, 401 forbidden
//!     → Decision
//! ```
//!
//! # Design Decisions
//! - The route table is shared read-only; nothing here mutates it
//! - Every decision is computed before anything is forwarded, so a
//!   rejection never leaves a half-forwarded request behind
//! - Bodies are only buffered for routes that inspect them

use std::future::Future;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderValue, Method, Request, Uri},
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::config::{ConfigError, GuardConfig};
use crate::http::request::{decoded_path, is_json_content};
use crate::observability::metrics;
use crate::policy::error::PolicyError;
use crate::policy::filters::{Filters, FILTERS_PARAM};
use crate::policy::nested::find_nested;
use crate::policy::query;
use crate::policy::value::{display_value, is_allowed, MatchMode};
use crate::routing::{Route, RouteMatch, RouteTable};

/// The forwarding side of the proxy, supplied by the transport.
pub trait Upstream: Send + Sync + 'static {
    /// Send an accepted request to the backend and return its response.
    fn forward(&self, request: Request<Body>) -> impl Future<Output = Response> + Send;
}

/// Outcome of evaluating one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Forward the request unchanged.
    Forward,
    /// Forward after replacing the query string and/or the body.
    ForwardRewritten {
        query: Option<String>,
        body: Option<Bytes>,
    },
    /// Refuse the request.
    Reject(PolicyError),
}

impl Decision {
    fn outcome(&self) -> &'static str {
        match self {
            Decision::Forward => "forward",
            Decision::ForwardRewritten { .. } => "rewrite",
            Decision::Reject(_) => "reject",
        }
    }
}

/// Engine settings taken from the route file.
#[derive(Debug, Clone, Copy)]
pub struct DirectorSettings {
    pub match_mode: MatchMode,
    pub max_body_bytes: usize,
}

impl Default for DirectorSettings {
    fn default() -> Self {
        let config = GuardConfig::default();
        Self {
            match_mode: config.match_mode,
            max_body_bytes: config.max_body_bytes,
        }
    }
}

/// Policy engine entry point.
#[derive(Debug, Clone)]
pub struct Director {
    table: Arc<RouteTable>,
    settings: DirectorSettings,
}

impl Director {
    pub fn new(table: Arc<RouteTable>, settings: DirectorSettings) -> Self {
        Self { table, settings }
    }

    /// Compile a validated configuration into a director.
    pub fn from_config(config: &GuardConfig) -> Result<Self, ConfigError> {
        let table = RouteTable::from_config(config)?;
        Ok(Self::new(
            Arc::new(table),
            DirectorSettings {
                match_mode: config.match_mode,
                max_body_bytes: config.max_body_bytes,
            },
        ))
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Decide on a request and either hand it to `upstream` (possibly
    /// rewritten) or answer with a JSON rejection.
    pub async fn direct<U: Upstream>(&self, request: Request<Body>, upstream: &U) -> Response {
        let route = match self.table.lookup(request.method(), &decoded_path(request.uri())) {
            RouteMatch::Bypass => {
                metrics::record_decision("bypass");
                return upstream.forward(request).await;
            }
            RouteMatch::Route(route) => route,
            RouteMatch::NoMatch => {
                metrics::record_decision("reject");
                return not_allowed(request.method(), request.uri()).into_response();
            }
        };

        if route.is_passthrough() {
            metrics::record_decision("forward");
            return upstream.forward(request).await;
        }

        let (mut parts, body) = request.into_parts();
        let (buffered, body) = if inspects_body(route, &parts.headers) {
            match axum::body::to_bytes(body, self.settings.max_body_bytes).await {
                Ok(bytes) => (Some(bytes), None),
                Err(e) => {
                    metrics::record_decision("reject");
                    return PolicyError::MalformedInput(format!("failed to read request body: {e}"))
                        .into_response();
                }
            }
        } else {
            (None, Some(body))
        };

        let decision = self.evaluate(route, &parts.uri, &parts.headers, buffered.as_deref());
        metrics::record_decision(decision.outcome());

        let (query, rewritten) = match decision {
            Decision::Reject(err) => return err.into_response(),
            Decision::Forward => (None, None),
            Decision::ForwardRewritten { query, body } => (query, body),
        };

        if let Some(query) = query {
            match with_query(&parts.uri, &query) {
                Ok(uri) => parts.uri = uri,
                Err(err) => return err.into_response(),
            }
        }

        let body = match (rewritten, buffered, body) {
            (Some(bytes), _, _) | (None, Some(bytes), _) => {
                parts.headers.remove(header::TRANSFER_ENCODING);
                parts.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));
                Body::from(bytes)
            }
            (None, None, Some(body)) => body,
            (None, None, None) => Body::empty(),
        };

        upstream.forward(Request::from_parts(parts, body)).await
    }

    /// Synchronous decision for a request whose body (if any) is already
    /// buffered.
    pub fn decide(&self, method: &Method, uri: &Uri, headers: &HeaderMap, body: Option<&[u8]>) -> Decision {
        match self.table.lookup(method, &decoded_path(uri)) {
            RouteMatch::Bypass => Decision::Forward,
            RouteMatch::NoMatch => Decision::Reject(not_allowed(method, uri)),
            RouteMatch::Route(route) if route.is_passthrough() => Decision::Forward,
            RouteMatch::Route(route) => self.evaluate(route, uri, headers, body),
        }
    }

    /// Run the checks of a matched route, in order: params, filters, body.
    pub fn evaluate(&self, route: &Route, uri: &Uri, headers: &HeaderMap, body: Option<&[u8]>) -> Decision {
        let raw_query = uri.query().unwrap_or("");

        if let Err(err) = self.check_params(route, raw_query) {
            return Decision::Reject(err);
        }

        let query = match self.apply_filters(route, raw_query) {
            Ok(query) => query,
            Err(err) => return Decision::Reject(err),
        };

        let body = if inspects_body(route, headers) {
            match self.check_body(route, body.unwrap_or_default()) {
                Ok(body) => Some(body),
                Err(err) => return Decision::Reject(err),
            }
        } else {
            None
        };

        if query.is_none() && body.is_none() {
            return Decision::Forward;
        }
        Decision::ForwardRewritten { query, body }
    }

    fn check_params(&self, route: &Route, raw_query: &str) -> Result<(), PolicyError> {
        for rule in &route.check_param {
            let Some(value) = query::first_value(raw_query, &rule.param).filter(|v| !v.is_empty()) else {
                continue;
            };
            tracing::debug!(param = %rule.param, value = %value, "Param found");
            if !is_allowed(&Value::String(value.clone()), &rule.allowed, self.settings.match_mode) {
                return Err(PolicyError::ForbiddenParam {
                    value,
                    param: rule.param.clone(),
                });
            }
        }
        Ok(())
    }

    /// Returns the rewritten query string when filters were injected.
    fn apply_filters(&self, route: &Route, raw_query: &str) -> Result<Option<String>, PolicyError> {
        if !route.uses_filters() {
            return Ok(None);
        }

        let mut filters = match query::first_value(raw_query, FILTERS_PARAM) {
            Some(raw) if !raw.is_empty() => Filters::parse(&raw)?,
            _ => Filters::default(),
        };

        for rule in &route.check_filter {
            for value in filters.values(&rule.filter_key) {
                if !is_allowed(value, &rule.allowed, self.settings.match_mode) {
                    return Err(PolicyError::ForbiddenFilter {
                        value: display_value(value),
                        filter: rule.filter_key.clone(),
                    });
                }
            }
        }

        if route.append_filter.is_empty() {
            return Ok(None);
        }
        for rule in &route.append_filter {
            filters.append(&rule.filter_key, &rule.values);
        }
        let encoded = filters.encode()?;
        Ok(Some(query::replace_param(raw_query, FILTERS_PARAM, &encoded)))
    }

    /// Validates the body and returns its re-encoded form.
    fn check_body(&self, route: &Route, body: &[u8]) -> Result<Bytes, PolicyError> {
        let decoded: Value =
            serde_json::from_slice(body).map_err(|e| PolicyError::MalformedInput(e.to_string()))?;
        let Value::Object(doc) = decoded else {
            return Err(PolicyError::MalformedInput("request body must be a JSON object".to_string()));
        };

        if tracing::enabled!(tracing::Level::DEBUG) {
            if let Ok(pretty) = serde_json::to_string_pretty(&doc) {
                tracing::debug!(body = %pretty, "Decoded request body");
            }
        }

        for rule in &route.check_json {
            let Some(found) = find_nested(&doc, &rule.key) else {
                tracing::info!(key = %rule.key_path(), "Key not found, rule does not apply");
                continue;
            };
            let candidates = match found {
                Value::Array(items) => items.as_slice(),
                single => std::slice::from_ref(single),
            };
            if let Some(forbidden) = candidates
                .iter()
                .find(|value| !is_allowed(value, &rule.allowed, self.settings.match_mode))
            {
                return Err(PolicyError::ForbiddenKey {
                    value: display_value(forbidden),
                    key: rule.key_path(),
                });
            }
        }

        serde_json::to_vec(&doc)
            .map(Bytes::from)
            .map_err(|e| PolicyError::Encoding(e.to_string()))
    }
}

fn inspects_body(route: &Route, headers: &HeaderMap) -> bool {
    !route.check_json.is_empty() && is_json_content(headers)
}

fn not_allowed(method: &Method, uri: &Uri) -> PolicyError {
    PolicyError::RouteNotAllowed {
        method: method.to_string(),
        path: decoded_path(uri).into_owned(),
    }
}

fn with_query(uri: &Uri, query: &str) -> Result<Uri, PolicyError> {
    let mut parts = uri.clone().into_parts();
    let path_and_query = if query.is_empty() {
        uri.path().to_string()
    } else {
        format!("{}?{}", uri.path(), query)
    };
    parts.path_and_query = Some(
        path_and_query
            .parse()
            .map_err(|e: axum::http::uri::InvalidUri| PolicyError::Encoding(e.to_string()))?,
    );
    Uri::from_parts(parts).map_err(|e| PolicyError::Encoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        AppendFilterConfig, CheckFilterConfig, CheckJsonConfig, CheckParamConfig, RouteConfig,
    };
    use axum::http::StatusCode;
    use serde_json::json;

    fn director(routes: Vec<RouteConfig>) -> Director {
        Director::from_config(&GuardConfig {
            routes_allowed: routes,
            ..GuardConfig::default()
        })
        .unwrap()
    }

    fn json_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    fn get(director: &Director, uri: &str) -> Decision {
        director.decide(&Method::GET, &uri.parse().unwrap(), &HeaderMap::new(), None)
    }

    fn containers_route() -> RouteConfig {
        let mut route = RouteConfig::new("GET", "^/containers/json$");
        route.check_param.push(CheckParamConfig {
            param: "all".into(),
            allowed_values: vec![json!("^true$"), json!("^false$")],
        });
        route
    }

    fn service_route() -> RouteConfig {
        let mut route = RouteConfig::new("POST", "^/services/create$");
        route.check_json.push(CheckJsonConfig {
            key: vec!["TaskTemplate".into(), "ContainerSpec".into(), "Image".into()],
            allowed_values: vec![json!("^nginx.*")],
        });
        route
    }

    fn label_filter_route() -> RouteConfig {
        let mut route = RouteConfig::new("GET", "^/containers/json$");
        route.append_filter.push(AppendFilterConfig {
            filter_key: "label".into(),
            values: vec![json!("team=infra")],
        });
        route
    }

    #[test]
    fn test_bypass_ignores_table() {
        let director = director(Vec::new());
        for uri in ["/_ping", "/version", "/info", "/v1.41/_ping"] {
            assert_eq!(get(&director, uri), Decision::Forward, "{uri}");
        }
        let head = director.decide(&Method::HEAD, &"/_ping".parse().unwrap(), &HeaderMap::new(), None);
        assert_eq!(head, Decision::Forward);
    }

    #[test]
    fn test_unconfigured_path_is_forbidden() {
        let director = director(vec![containers_route()]);
        let Decision::Reject(err) = get(&director, "/containers/stats") else {
            panic!("expected a rejection");
        };
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.to_string(), "GET /containers/stats Endpoint not allowed");
    }

    #[test]
    fn test_passthrough_route_forwards() {
        let director = director(vec![RouteConfig::new("GET", "^/images/json$")]);
        assert_eq!(get(&director, "/v1.41/images/json?all=1"), Decision::Forward);
    }

    #[test]
    fn test_param_checks() {
        let director = director(vec![containers_route()]);

        let Decision::Reject(err) = get(&director, "/containers/json?all=maybe") else {
            panic!("expected a rejection");
        };
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "Found forbidden value: maybe for param all");

        assert_eq!(get(&director, "/containers/json?all=true"), Decision::Forward);
        // Absent or empty parameters are not checked.
        assert_eq!(get(&director, "/containers/json"), Decision::Forward);
        assert_eq!(get(&director, "/containers/json?all="), Decision::Forward);
    }

    #[test]
    fn test_filter_injection() {
        let director = director(vec![label_filter_route()]);
        let Decision::ForwardRewritten { query: Some(query), body: None } =
            get(&director, "/containers/json?all=1&filters=%7B%22label%22%3A%7B%22foo%22%3Atrue%7D%7D")
        else {
            panic!("expected a rewritten query");
        };
        assert_eq!(query::first_value(&query, "all").as_deref(), Some("1"));
        assert_eq!(
            query::first_value(&query, "filters").as_deref(),
            Some(r#"{"label":["foo","team=infra"]}"#)
        );
    }

    #[test]
    fn test_filter_injection_without_client_filters() {
        let director = director(vec![label_filter_route()]);
        let Decision::ForwardRewritten { query: Some(query), .. } = get(&director, "/containers/json") else {
            panic!("expected a rewritten query");
        };
        assert_eq!(query::first_value(&query, "filters").as_deref(), Some(r#"{"label":["team=infra"]}"#));
    }

    #[test]
    fn test_malformed_filters() {
        let director = director(vec![label_filter_route()]);
        let Decision::Reject(err) = get(&director, "/containers/json?filters=%7B%22label%22%3A1%7D") else {
            panic!("expected a rejection");
        };
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let Decision::Reject(err) = get(&director, "/containers/json?filters=nope") else {
            panic!("expected a rejection");
        };
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_filter_checks_run_before_injection() {
        let mut route = label_filter_route();
        route.check_filter.push(CheckFilterConfig {
            filter_key: "label".into(),
            allowed_values: vec![json!("^com\\.example\\.")],
        });
        let director = director(vec![route]);

        let Decision::Reject(err) = get(&director, "/containers/json?filters=%7B%22label%22%3A%5B%22secret%22%5D%7D")
        else {
            panic!("expected a rejection");
        };
        assert_eq!(err.to_string(), "Found forbidden value: secret for filter label");

        // The injected value does not match the check but is never checked.
        assert!(matches!(
            get(&director, "/containers/json?filters=%7B%22label%22%3A%5B%22com.example.app%22%5D%7D"),
            Decision::ForwardRewritten { query: Some(_), .. }
        ));
    }

    #[test]
    fn test_json_body_checks() {
        let director = director(vec![service_route()]);
        let uri: Uri = "/v1.41/services/create".parse().unwrap();

        let allowed: &[u8] = br#"{"Name":"web","TaskTemplate":{"ContainerSpec":{"Image":"nginx:alpine"}}}"#;
        let Decision::ForwardRewritten { query: None, body: Some(body) } =
            director.decide(&Method::POST, &uri, &json_headers(), Some(allowed))
        else {
            panic!("expected the body to be re-encoded");
        };
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["TaskTemplate"]["ContainerSpec"]["Image"], "nginx:alpine");

        let forbidden: &[u8] = br#"{"Name":"web","TaskTemplate":{"ContainerSpec":{"Image":"ubuntu:latest"}}}"#;
        let Decision::Reject(err) = director.decide(&Method::POST, &uri, &json_headers(), Some(forbidden)) else {
            panic!("expected a rejection");
        };
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            err.to_string(),
            "Found forbidden value: ubuntu:latest for key TaskTemplate.ContainerSpec.Image"
        );
    }

    #[test]
    fn test_json_array_values_are_checked_per_element() {
        let mut route = RouteConfig::new("POST", "^/containers/create$");
        route.check_json.push(CheckJsonConfig {
            key: vec!["HostConfig".into(), "Mounts".into()],
            allowed_values: vec![json!({"Source": "^/mnt/scratch", "ReadOnly": true})],
        });
        let director = director(vec![route]);
        let uri: Uri = "/containers/create".parse().unwrap();

        let ok: &[u8] = br#"{"HostConfig":{"Mounts":[{"Source":"/mnt/scratch/a","ReadOnly":true},{"Source":"/mnt/scratch/b","ReadOnly":true,"Target":"/b"}]}}"#;
        assert!(matches!(
            director.decide(&Method::POST, &uri, &json_headers(), Some(ok)),
            Decision::ForwardRewritten { body: Some(_), .. }
        ));

        let bad: &[u8] = br#"{"HostConfig":{"Mounts":[{"Source":"/mnt/scratch/a","ReadOnly":true},{"Source":"/etc","ReadOnly":true}]}}"#;
        let Decision::Reject(err) = director.decide(&Method::POST, &uri, &json_headers(), Some(bad)) else {
            panic!("expected a rejection");
        };
        assert_eq!(
            err.to_string(),
            r#"Found forbidden value: {"ReadOnly":true,"Source":"/etc"} for key HostConfig.Mounts"#
        );
    }

    #[test]
    fn test_missing_key_does_not_reject() {
        let director = director(vec![service_route()]);
        let uri: Uri = "/services/create".parse().unwrap();
        assert!(matches!(
            director.decide(&Method::POST, &uri, &json_headers(), Some(&br#"{"Name":"web"}"#[..])),
            Decision::ForwardRewritten { body: Some(_), .. }
        ));
    }

    #[test]
    fn test_malformed_body() {
        let director = director(vec![service_route()]);
        let uri: Uri = "/services/create".parse().unwrap();
        let bodies: [&[u8]; 3] = [b"{", b"", b"[1,2]"];
        for body in bodies {
            let Decision::Reject(err) = director.decide(&Method::POST, &uri, &json_headers(), Some(body)) else {
                panic!("expected a rejection");
            };
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_non_json_content_skips_body_checks() {
        let director = director(vec![service_route()]);
        let uri: Uri = "/services/create".parse().unwrap();
        assert_eq!(
            director.decide(&Method::POST, &uri, &HeaderMap::new(), Some(&b"not json"[..])),
            Decision::Forward
        );
    }

    #[test]
    fn test_encoded_path_is_matched_decoded() {
        let director = director(vec![RouteConfig::new("GET", "^/images/json$")]);
        assert_eq!(get(&director, "/images%2Fjson"), Decision::Forward);
        assert_eq!(get(&director, "/v1.41/images%2fjson"), Decision::Forward);

        let Decision::Reject(err) = get(&director, "/images%2Fother") else {
            panic!("expected a rejection");
        };
        assert_eq!(err.to_string(), "GET /images/other Endpoint not allowed");
    }

    #[test]
    fn test_lenient_mode_from_config() {
        let mut route = RouteConfig::new("GET", "^/containers/json$");
        route.check_param.push(CheckParamConfig {
            param: "all".into(),
            allowed_values: vec![json!(true), json!("^true$")],
        });
        let config = |mode: MatchMode| GuardConfig {
            routes_allowed: vec![route.clone()],
            match_mode: mode,
            ..GuardConfig::default()
        };

        let strict = Director::from_config(&config(MatchMode::Strict)).unwrap();
        assert!(matches!(get(&strict, "/containers/json?all=true"), Decision::Reject(_)));

        let lenient = Director::from_config(&config(MatchMode::Lenient)).unwrap();
        assert_eq!(get(&lenient, "/containers/json?all=true"), Decision::Forward);
        assert!(matches!(get(&lenient, "/containers/json?all=maybe"), Decision::Reject(_)));
    }

    #[test]
    fn test_with_query() {
        let uri: Uri = "/containers/json?all=1".parse().unwrap();
        assert_eq!(with_query(&uri, "all=0").unwrap(), "/containers/json?all=0");
        assert_eq!(with_query(&uri, "").unwrap(), "/containers/json");
    }
}
