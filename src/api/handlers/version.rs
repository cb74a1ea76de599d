/*
 * Responsibility
 * - GET / (diagnostics): version, name, description
 * - No authentication
 */
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;

pub const NAME: &str = "role-gateway";
pub const DESCRIPTION: &str = "API gateway that forwards role-checked requests to backend APIs";

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub async fn version() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(VersionResponse {
            version: env!("CARGO_PKG_VERSION"),
            name: NAME,
            description: DESCRIPTION,
        }),
    )
}
