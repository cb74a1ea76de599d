/*
 * Responsibility
 * - Fallback handler: hand the whole request (body unread) to the dispatcher
 * - DispatchError renders itself as `{code, msg}`
 */
use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
};

use crate::error::DispatchError;
use crate::state::AppState;

pub async fn proxy(
    State(state): State<AppState>,
    req: Request<Body>,
) -> Result<Response, DispatchError> {
    state.dispatcher.handle(req).await
}
