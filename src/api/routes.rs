/*
 * Responsibility
 * - `/` (any method) answers with process identity and never reaches route matching
 * - every other path goes to the dispatcher
 */
use axum::{Router, routing::any};

use crate::api::handlers::{proxy::proxy, version::version};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", any(version)).fallback(proxy)
}
