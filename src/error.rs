/*
 * Responsibility
 * - DispatchError: per-request pipeline failures (route / auth / role)
 * - IntoResponse: HTTP status + `{code, msg}` JSON body
 * - AppError: process-level failures (config, bind, serve)
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::services::auth::AuthError;

/// Body of every error the gateway itself produces.
///
/// Backend responses are relayed untouched and never wrapped in this shape.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: u16,
    pub msg: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("Not Found")]
    RouteNotFound,
    #[error("missing bearer token")]
    MissingCredential,
    #[error("missing bearer token")]
    MalformedCredential,
    #[error("unexpected signing method")]
    UnsupportedSigningAlgorithm { alg: String },
    #[error("invalid token: {0}")]
    InvalidSignatureOrEncoding(String),
    #[error("token expired at {}", crate::services::auth::format_epoch(.expires_at))]
    ExpiredCredential { expires_at: i64 },
    #[error("Required role not found in JWT")]
    RoleNotPermitted,
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::RouteNotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Short machine-friendly label used in log events.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::RouteNotFound => "route_not_found",
            DispatchError::MissingCredential => "missing_credential",
            DispatchError::MalformedCredential => "malformed_credential",
            DispatchError::UnsupportedSigningAlgorithm { .. } => "unsupported_signing_algorithm",
            DispatchError::InvalidSignatureOrEncoding(_) => "invalid_signature_or_encoding",
            DispatchError::ExpiredCredential { .. } => "expired_credential",
            DispatchError::RoleNotPermitted => "role_not_permitted",
        }
    }
}

impl From<AuthError> for DispatchError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Missing => DispatchError::MissingCredential,
            AuthError::Malformed => DispatchError::MalformedCredential,
            AuthError::UnexpectedAlgorithm(alg) => {
                DispatchError::UnsupportedSigningAlgorithm { alg }
            }
            AuthError::Invalid(detail) => DispatchError::InvalidSignatureOrEncoding(detail),
            AuthError::Expired { expires_at } => DispatchError::ExpiredCredential { expires_at },
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            code: status.as_u16(),
            msg: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(err: DispatchError) -> (StatusCode, serde_json::Value) {
        let res = err.into_response();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn route_not_found_renders_404_body() {
        let (status, body) = body_json(DispatchError::RouteNotFound).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, serde_json::json!({"code": 404, "msg": "Not Found"}));
    }

    #[tokio::test]
    async fn role_failure_renders_401_body() {
        let (status, body) = body_json(DispatchError::RoleNotPermitted).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            body,
            serde_json::json!({"code": 401, "msg": "Required role not found in JWT"})
        );
    }

    #[test]
    fn algorithm_error_does_not_echo_the_declared_alg() {
        let err = DispatchError::UnsupportedSigningAlgorithm {
            alg: "none".to_string(),
        };
        assert_eq!(err.to_string(), "unexpected signing method");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn expired_message_carries_timestamp() {
        let err = DispatchError::ExpiredCredential { expires_at: 0 };
        assert_eq!(err.to_string(), "token expired at 1970-01-01T00:00:00+00:00");
    }
}
