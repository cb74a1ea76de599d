//! Outer layers every gateway request passes through, proxied or not.
//!
//! Order, outermost first:
//! 1. timeout errors turned into `408 Request Timeout`
//! 2. `x-request-id` assigned (a UUID unless the caller sent one) and echoed
//!    back on the response
//! 3. the configured deadline for the backend to start answering
//! 4. one access-log span per request
//!
//! Request bodies are not capped here; the forwarder streams them upstream.
//! A response body already streaming is not cut off by the deadline.

use std::time::Duration;

use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::http::{StatusCode, header::HeaderName};
use tower::timeout::TimeoutLayer;
use tower::{BoxError, ServiceBuilder};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Wrap `router` in the gateway's outer layers, with `timeout` as the deadline.
pub fn apply(router: Router, timeout: Duration) -> Router {
    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    let layers = ServiceBuilder::new()
        // Router::layer needs an infallible service.
        .layer(HandleErrorLayer::new(|err: BoxError| async move {
            if err.is::<tower::timeout::error::Elapsed>() {
                StatusCode::REQUEST_TIMEOUT
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }))
        // Keep the caller's id or mint one, and echo it back.
        .layer(SetRequestIdLayer::new(
            request_id_header.clone(),
            MakeRequestUuid,
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http());

    router.layer(layers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get};
    use tower::ServiceExt;

    #[tokio::test]
    async fn slow_backend_answer_becomes_408() {
        let router = Router::new().route(
            "/",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );

        let res = apply(router, Duration::from_millis(20))
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn request_id_is_minted_when_absent() {
        let router = Router::new().route("/", get(|| async { "ok" }));

        let res = apply(router, Duration::from_secs(5))
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let id = res.headers()[REQUEST_ID_HEADER].to_str().unwrap();
        assert!(!id.is_empty());
    }
}
