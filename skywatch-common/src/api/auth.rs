//! Bearer-token verification
//!
//! Every non-public request carries `Authorization: Bearer <token>`,
//! an HS256 JWT issued by the SkyWatch auth service. This module parses
//! the header and validates the token; it knows nothing about HTTP
//! frameworks or response codes.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Claims carried by a SkyWatch access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Principal id; opaque string, whatever the issuer uses
    #[serde(rename = "userId")]
    pub user_id: String,
    pub username: String,
    /// Expiry timestamp (Unix seconds)
    pub exp: i64,
    /// Issued-at timestamp (Unix seconds)
    #[serde(default)]
    pub iat: i64,
}

/// Token verification failures
///
/// `Expired` is kept distinct so callers can surface a distinguishable
/// reason; everything else collapses to a generic rejection.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("no token provided")]
    MissingToken,

    #[error("invalid authorization header format")]
    MalformedHeader,

    #[error("token expired")]
    ExpiredToken,

    #[error("invalid token: {0}")]
    InvalidToken(String),
}

/// Extract the token from an `Authorization` header value
///
/// Accepts `Bearer <token>` with a case-insensitive scheme and any amount
/// of whitespace between scheme and token.
pub fn parse_bearer(header: &str) -> Option<&str> {
    let rest = header
        .get(..7)
        .filter(|prefix| prefix.eq_ignore_ascii_case("bearer "))
        .map(|_| &header[7..])?;
    let token = rest.trim_start();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Verifies bearer tokens against a shared secret
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Validate and decode a token
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);

        let token_data =
            decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                ErrorKind::InvalidSignature => {
                    AuthError::InvalidToken("invalid signature".to_string())
                }
                _ => AuthError::InvalidToken(e.to_string()),
            })?;

        Ok(token_data.claims)
    }

    /// Parse the header and verify the token it carries
    pub fn verify_header(&self, header: Option<&str>) -> Result<Claims, AuthError> {
        let header = header.ok_or(AuthError::MissingToken)?;
        let token = parse_bearer(header).ok_or(AuthError::MalformedHeader)?;
        self.verify(token)
    }
}
