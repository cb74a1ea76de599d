//! Structured dispatch events.
//!
//! The dispatcher owns one observer instance; nothing in the pipeline logs
//! through a process-wide handle of its own.
use axum::http::{Method, Uri};

use crate::error::DispatchError;
use crate::services::proxy::{DirectError, ForwardError};

pub trait DispatchObserver: Send + Sync {
    fn route_not_found(&self, method: &Method, path: &str);

    fn rejected(&self, route: &str, method: &Method, path: &str, error: &DispatchError);

    fn preflight(&self, route: &str, path: &str);

    fn forwarding(&self, route: &str, method: &Method, target: &Uri);

    fn direct_failed(&self, route: &str, error: &DirectError);

    fn upstream_failed(&self, route: &str, error: &ForwardError);
}

/// Emits every event through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl DispatchObserver for TracingObserver {
    fn route_not_found(&self, method: &Method, path: &str) {
        tracing::debug!(%method, path, "no route matched");
    }

    fn rejected(&self, route: &str, method: &Method, path: &str, error: &DispatchError) {
        tracing::warn!(
            route,
            %method,
            path,
            reason = error.kind(),
            error = %error,
            "request rejected"
        );
    }

    fn preflight(&self, route: &str, path: &str) {
        tracing::debug!(route, path, "preflight passes without authentication");
    }

    fn forwarding(&self, route: &str, method: &Method, target: &Uri) {
        tracing::info!(route, %method, %target, "proxying");
    }

    fn direct_failed(&self, route: &str, error: &DirectError) {
        tracing::error!(route, error = %error, "could not build outbound request");
    }

    fn upstream_failed(&self, route: &str, error: &ForwardError) {
        tracing::error!(
            route,
            target = error.target(),
            error = %error,
            "upstream request failed"
        );
    }
}
