pub mod policy;
pub mod token;

pub use policy::authorize;
pub use token::{AuthClaims, AuthError, Authenticator};

/// Render epoch seconds as RFC 3339 for error messages.
pub fn format_epoch(secs: &i64) -> String {
    chrono::DateTime::from_timestamp(*secs, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}
