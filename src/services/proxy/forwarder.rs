//! Forwarding transport: sends a directed request to its backend and relays
//! the answer.
//!
//! - Connections are pooled per origin by `reqwest::Client`.
//! - Hop-by-hop headers are dropped in both directions; everything else is
//!   relayed as-is (status, headers, streamed body).
//! - No retries. A transport failure is returned as [`ForwardError`]; the
//!   dispatcher reports it and answers a bare `502 Bad Gateway`.
//! - Dropping the returned future (caller went away) abandons the backend call.
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{Body, HttpBody},
    extract::ConnectInfo,
    http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode, header::CONNECTION},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Headers that only describe a single hop and are never relayed.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The backend could not be reached or did not produce a response head.
#[derive(Debug, Error)]
#[error("upstream request to {target} failed: {source}")]
pub struct ForwardError {
    target: String,
    #[source]
    source: BoxError,
}

impl ForwardError {
    pub fn new(target: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            target: target.into(),
            source: source.into(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

#[async_trait]
pub trait Forwarder: Send + Sync {
    /// Send `request` (absolute URI already set) and return the backend's response.
    async fn forward(&self, request: Request<Body>) -> Result<Response, ForwardError>;
}

#[derive(Clone, Debug)]
pub struct HttpForwarder {
    client: reqwest::Client,
}

impl HttpForwarder {
    pub fn new(
        connect_timeout: Duration,
        read_timeout: Option<Duration>,
    ) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            // redirects belong to the caller
            .redirect(reqwest::redirect::Policy::none());
        if let Some(timeout) = read_timeout {
            builder = builder.read_timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(&self, request: Request<Body>) -> Result<Response, ForwardError> {
        let (parts, body) = request.into_parts();
        let target = parts.uri.to_string();

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            append_forwarded_for(&mut headers, addr.ip());
        }

        let mut builder = self
            .client
            .request(parts.method, target.as_str())
            .headers(headers);
        // A body-less request stays body-less (no chunked GETs).
        if body.size_hint().exact() != Some(0) {
            builder = builder.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        let upstream = builder
            .send()
            .await
            .map_err(|e| ForwardError::new(target, e))?;
        Ok(relay(upstream))
    }
}

fn relay(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    strip_hop_by_hop(&mut headers);

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// What a caller sees when the backend could not be reached.
pub fn bad_gateway() -> Response {
    StatusCode::BAD_GATEWAY.into_response()
}

/// Remove the fixed hop-by-hop set plus any header named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
}

/// Append the caller address to any `X-Forwarded-For` chain already present.
pub fn append_forwarded_for(headers: &mut HeaderMap, ip: IpAddr) {
    let prior: Vec<&str> = headers
        .get_all(&X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();

    let value = if prior.is_empty() {
        ip.to_string()
    } else {
        format!("{}, {}", prior.join(", "), ip)
    };

    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
