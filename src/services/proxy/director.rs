//! Rewrites an inbound request into the request sent to a route's backend.
//!
//! Steps, in order:
//! 1. scheme/authority (and `Host`) taken from the backend origin
//! 2. path = backend path joined with the inbound path minus the route prefix
//! 3. query = backend query `&` inbound query
//! 4. an explicitly empty `User-Agent` when the caller sent none
//! 5. `Authorization` replaced by the route's service credential, or removed
//!    (OPTIONS requests keep theirs)
//!
//! Nothing else in the header map is touched. The body is moved, not buffered.
use axum::{
    body::Body,
    http::{HeaderValue, Method, Request, Uri, header},
};
use thiserror::Error;

use crate::services::routes::RouteDefinition;

#[derive(Debug, Error)]
pub enum DirectError {
    #[error("request path does not belong to route '{0}'")]
    PrefixMismatch(String),
    #[error("invalid outbound target: {0}")]
    InvalidTarget(#[from] axum::http::Error),
}

/// Build the outbound request for `route` from `inbound`.
pub fn build_outbound_request(
    inbound: Request<Body>,
    route: &RouteDefinition,
) -> Result<Request<Body>, DirectError> {
    let (mut parts, body) = inbound.into_parts();
    let backend = route.backend();

    let remainder = route
        .matcher()
        .strip(parts.uri.path())
        .ok_or_else(|| DirectError::PrefixMismatch(route.name().to_string()))?;
    let path = single_joining_slash(backend.path(), remainder);
    let query = merge_query(backend.query().unwrap_or(""), parts.uri.query().unwrap_or(""));

    let path_and_query = if query.is_empty() {
        path
    } else {
        format!("{}?{}", path, query)
    };

    let authority = backend_authority(route);
    parts.uri = Uri::builder()
        .scheme(backend.scheme())
        .authority(authority.as_str())
        .path_and_query(path_and_query)
        .build()?;

    let host = HeaderValue::from_str(&authority).map_err(axum::http::Error::from)?;
    parts.headers.insert(header::HOST, host);

    if !parts.headers.contains_key(header::USER_AGENT) {
        // An explicit empty value keeps the transport from adding its own.
        parts
            .headers
            .insert(header::USER_AGENT, HeaderValue::from_static(""));
    }

    if parts.method != Method::OPTIONS {
        match route.service_authorization() {
            Some(value) => {
                parts.headers.insert(header::AUTHORIZATION, value.clone());
            }
            None => {
                parts.headers.remove(header::AUTHORIZATION);
            }
        }
    }

    Ok(Request::from_parts(parts, body))
}

/// Join two path pieces with exactly one slash at the seam.
pub fn single_joining_slash(a: &str, b: &str) -> String {
    let a_slash = a.ends_with('/');
    let b_slash = b.starts_with('/');
    match (a_slash, b_slash) {
        (true, true) => format!("{}{}", a, &b[1..]),
        (false, false) => format!("{}/{}", a, b),
        _ => format!("{}{}", a, b),
    }
}

/// Backend query first, then the caller's; `&` only when both are present.
pub fn merge_query(backend: &str, inbound: &str) -> String {
    if backend.is_empty() || inbound.is_empty() {
        format!("{}{}", backend, inbound)
    } else {
        format!("{}&{}", backend, inbound)
    }
}

fn backend_authority(route: &RouteDefinition) -> String {
    let backend = route.backend();
    // host presence is checked when the route is built
    let host = backend.host_str().unwrap_or_default();
    match backend.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn github(credential: &str) -> RouteDefinition {
        RouteDefinition::new(
            "github",
            "https://api.github.com/repos/org",
            credential,
            ["admin"],
        )
        .unwrap()
    }

    fn request(method: Method, uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::HOST, "gateway.local")
    }

    #[test]
    fn joins_paths_with_one_slash() {
        assert_eq!(single_joining_slash("/api/", "/"), "/api/");
        assert_eq!(single_joining_slash("/api", "/foo"), "/api/foo");
        assert_eq!(single_joining_slash("/api/", "/foo"), "/api/foo");
        assert_eq!(single_joining_slash("/api", "foo"), "/api/foo");
        assert_eq!(single_joining_slash("/", "/"), "/");
        assert_eq!(single_joining_slash("", "/x"), "/x");
    }

    #[test]
    fn merges_queries() {
        assert_eq!(merge_query("a=1", "b=2"), "a=1&b=2");
        assert_eq!(merge_query("", "b=2"), "b=2");
        assert_eq!(merge_query("a=1", ""), "a=1");
        assert_eq!(merge_query("", ""), "");
    }

    #[test]
    fn rewrites_target_and_path() {
        let req = request(Method::GET, "/github/issues?state=open")
            .body(Body::empty())
            .unwrap();

        let out = build_outbound_request(req, &github("ghtoken")).unwrap();

        assert_eq!(
            out.uri().to_string(),
            "https://api.github.com/repos/org/issues?state=open"
        );
        assert_eq!(out.headers()[header::HOST], "api.github.com");
        assert_eq!(out.method(), Method::GET);
    }

    #[test]
    fn exact_prefix_maps_to_backend_root_path() {
        let route = RouteDefinition::new("svc", "http://10.0.0.1:8081/api/", "", ["a"]).unwrap();
        let req = request(Method::GET, "/svc").body(Body::empty()).unwrap();

        let out = build_outbound_request(req, &route).unwrap();

        assert_eq!(out.uri().to_string(), "http://10.0.0.1:8081/api/");
        assert_eq!(out.headers()[header::HOST], "10.0.0.1:8081");
    }

    #[test]
    fn backend_query_comes_first() {
        let route =
            RouteDefinition::new("svc", "http://backend.local/v1?key=abc", "", ["a"]).unwrap();
        let req = request(Method::GET, "/svc/items?page=2")
            .body(Body::empty())
            .unwrap();

        let out = build_outbound_request(req, &route).unwrap();

        assert_eq!(out.uri().to_string(), "http://backend.local/v1/items?key=abc&page=2");
    }

    #[test]
    fn caller_credential_is_replaced_for_every_method() {
        for method in [Method::GET, Method::POST, Method::DELETE] {
            let req = request(method.clone(), "/github/x")
                .header(header::AUTHORIZATION, "Bearer caller.jwt.token")
                .body(Body::empty())
                .unwrap();

            let out = build_outbound_request(req, &github("ghtoken")).unwrap();

            assert_eq!(out.headers()[header::AUTHORIZATION], "Bearer ghtoken", "{}", method);
            assert_eq!(out.headers().get_all(header::AUTHORIZATION).iter().count(), 1);
        }
    }

    #[test]
    fn credential_is_added_when_caller_sent_none() {
        let req = request(Method::GET, "/github/x").body(Body::empty()).unwrap();
        let out = build_outbound_request(req, &github("ghtoken")).unwrap();
        assert_eq!(out.headers()[header::AUTHORIZATION], "Bearer ghtoken");
    }

    #[test]
    fn caller_credential_is_dropped_without_service_credential() {
        let req = request(Method::POST, "/github/x")
            .header(header::AUTHORIZATION, "Bearer caller.jwt.token")
            .body(Body::empty())
            .unwrap();

        let out = build_outbound_request(req, &github("")).unwrap();

        assert!(out.headers().get(header::AUTHORIZATION).is_none());
    }

    #[test]
    fn options_keeps_its_headers() {
        let req = request(Method::OPTIONS, "/github/x")
            .header(header::AUTHORIZATION, "Bearer caller.jwt.token")
            .body(Body::empty())
            .unwrap();

        let out = build_outbound_request(req, &github("ghtoken")).unwrap();

        assert_eq!(out.headers()[header::AUTHORIZATION], "Bearer caller.jwt.token");
    }

    #[test]
    fn missing_user_agent_becomes_empty() {
        let req = request(Method::GET, "/github").body(Body::empty()).unwrap();
        let out = build_outbound_request(req, &github("")).unwrap();
        assert_eq!(out.headers()[header::USER_AGENT], "");
    }

    #[test]
    fn caller_user_agent_is_kept() {
        let req = request(Method::GET, "/github")
            .header(header::USER_AGENT, "curl/8.0")
            .header("x-custom", "1")
            .body(Body::empty())
            .unwrap();

        let out = build_outbound_request(req, &github("")).unwrap();

        assert_eq!(out.headers()[header::USER_AGENT], "curl/8.0");
        assert_eq!(out.headers()["x-custom"], "1");
    }

    #[test]
    fn foreign_path_is_refused() {
        let req = request(Method::GET, "/gitlab/x").body(Body::empty()).unwrap();
        assert!(matches!(
            build_outbound_request(req, &github("")),
            Err(DirectError::PrefixMismatch(_))
        ));
    }
}
