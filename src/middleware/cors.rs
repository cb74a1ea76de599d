//! CORS policy for browser clients.
//!
//! Policy:
//! - No origins configured: no CORS layer at all. Preflight requests then go
//!   through the dispatcher to the backend like any other OPTIONS request.
//! - Origins configured: exact-match allowlist, WITHOUT credentials.
//! - `*` in the list: any origin, honoured outside production only.
//!
//! A configured layer answers preflights itself, so the backend never sees them.

use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::Config;
use crate::middleware::http::REQUEST_ID_HEADER;

/// Apply CORS policy to the given Router.
///
/// IMPORTANT:
/// - Do not combine wildcard origin (`Any`) with `allow_credentials(true)`.
pub fn apply(router: Router, config: &Config) -> Router {
    match build(config) {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

fn build(config: &Config) -> Option<CorsLayer> {
    if config.cors_allowed_origins.is_empty() {
        return None;
    }

    let wildcard = config.cors_allowed_origins.iter().any(|o| o == "*");
    let cors = if wildcard && !config.app_env.is_production() {
        CorsLayer::new().allow_origin(Any)
    } else {
        if wildcard {
            tracing::warn!("ignoring wildcard CORS origin in production");
        }
        let allowed: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter(|s| s.as_str() != "*")
            .filter_map(|s| HeaderValue::from_str(s).ok())
            .collect();

        let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _req| {
            allowed.iter().any(|v| v == origin)
        });

        CorsLayer::new().allow_origin(allow_origin)
    }
    .allow_methods([
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ])
    .allow_headers([
        header::AUTHORIZATION,
        header::CONTENT_TYPE,
        header::ACCEPT,
        HeaderName::from_static(REQUEST_ID_HEADER),
    ])
    .max_age(std::time::Duration::from_secs(60 * 10));

    Some(cors)
}
