use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// The only signing algorithm a caller token may declare.
const ACCEPTED_ALG: &str = "HS256";

// Errors returned by bearer-token authentication.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    Missing,
    #[error("missing bearer token")]
    Malformed,
    #[error("unexpected signing method: {0}")]
    UnexpectedAlgorithm(String),
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("token expired at {}", super::format_epoch(.expires_at))]
    Expired { expires_at: i64 },
}

/// Identity extracted from a verified caller token.
///
/// Built fresh for every request and dropped with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthClaims {
    pub subject: String,
    pub email: String,
    pub roles: Vec<String>,
    pub expires_at: i64,
}

/// Token payload as it appears on the wire.
///
/// Identity fields are optional so an explicit `null` reads the same as an
/// absent key. `app_metadata` is kept as a raw `Value`: callers from other
/// issuers put all sorts of shapes there and a bad shape must not fail
/// authentication.
#[derive(Debug, Clone, Deserialize)]
struct TokenClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
    #[serde(default)]
    app_metadata: Value,
}

impl TokenClaims {
    /// `app_metadata.roles` as strings; anything else yields an empty list.
    fn roles(&self) -> Vec<String> {
        self.app_metadata
            .get("roles")
            .and_then(Value::as_array)
            .map(|roles| {
                roles
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn into_auth_claims(self) -> AuthClaims {
        AuthClaims {
            roles: self.roles(),
            subject: self.sub.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            expires_at: self.exp.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct DeclaredHeader {
    #[serde(default)]
    alg: String,
}

/// HS256 caller-token verifier bound to the gateway's shared secret.
///
/// - Key material is intentionally not printable via Debug.
#[derive(Clone)]
pub struct Authenticator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("algorithm", &ACCEPTED_ALG)
            .finish()
    }
}

impl Authenticator {
    pub fn new(shared_secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked by hand (strictly in the future, no leeway).
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.required_spec_claims.clear();

        Self {
            decoding_key: DecodingKey::from_secret(shared_secret.as_bytes()),
            validation,
        }
    }

    /// Authenticate the raw `Authorization` header value against the current time.
    pub fn authenticate(&self, authorization: Option<&str>) -> Result<AuthClaims, AuthError> {
        self.authenticate_at(authorization, chrono::Utc::now().timestamp())
    }

    /// Same as [`authenticate`](Self::authenticate) with an explicit clock (epoch seconds).
    pub fn authenticate_at(
        &self,
        authorization: Option<&str>,
        now: i64,
    ) -> Result<AuthClaims, AuthError> {
        let header = authorization.ok_or(AuthError::Missing)?;
        let token = extract_bearer_token(header).ok_or(AuthError::Malformed)?;

        // Read the algorithm the token itself declares before handing it to the
        // verifier. `none` and every non-HS256 family stop here.
        let alg = declared_algorithm(token)?;
        if alg != ACCEPTED_ALG {
            return Err(AuthError::UnexpectedAlgorithm(alg));
        }

        let data =
            jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
                .map_err(|e| AuthError::Invalid(e.to_string()))?;

        let claims = data.claims.into_auth_claims();
        if claims.expires_at <= now {
            return Err(AuthError::Expired {
                expires_at: claims.expires_at,
            });
        }

        Ok(claims)
    }
}

/// `Bearer <token>`: scheme case-insensitive, one space, a single token with no
/// whitespace running to the end of the value.
pub fn extract_bearer_token(value: &str) -> Option<&str> {
    let scheme = value.get(..6)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = value.get(6..)?.strip_prefix(' ')?;
    if token.is_empty() || token.chars().any(char::is_whitespace) {
        return None;
    }
    Some(token)
}

fn declared_algorithm(token: &str) -> Result<String, AuthError> {
    let mut segments = token.split('.');
    let header = match (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) {
        (Some(header), Some(_), Some(_), None) => header,
        _ => {
            return Err(AuthError::Invalid(
                "token contains an invalid number of segments".to_string(),
            ));
        }
    };

    let raw = URL_SAFE_NO_PAD
        .decode(header.trim_end_matches('='))
        .map_err(|e| AuthError::Invalid(format!("malformed header encoding: {}", e)))?;
    let declared: DeclaredHeader = serde_json::from_slice(&raw)
        .map_err(|e| AuthError::Invalid(format!("malformed header: {}", e)))?;

    Ok(declared.alg)
}
