//! Session tokens for the dashboard API.
//!
//! Sessions are self-contained signed JWTs (HS256, keyed by the server
//! secret). There is no revocation list: rotating the server secret
//! invalidates every outstanding session, and that is the recovery story.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::db::User;
use crate::AppState;

/// The session token was expired, forged, or malformed. Callers see only
/// this; which check failed is logged, never surfaced.
#[derive(Debug, Error)]
#[error("invalid session token")]
pub struct InvalidSessionToken;

/// Claims carried in a session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    /// Local user id
    pub sub: String,
    pub username: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp), enforced on verify
    pub exp: i64,
}

/// Issues and verifies session tokens. Keys are derived once from the server
/// secret and shared read-only across requests.
pub struct SessionSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SessionSigner {
    pub fn new(server_secret: &str, ttl_days: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(server_secret.as_bytes()),
            decoding: DecodingKey::from_secret(server_secret.as_bytes()),
            ttl: Duration::days(ttl_days),
        }
    }

    /// Issue a signed session token for a user.
    pub fn issue(&self, user_id: &str, username: &str) -> Result<String, InvalidSessionToken> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: user_id.to_string(),
            username: username.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| {
            tracing::error!(error = %e, "Failed to sign session token");
            InvalidSessionToken
        })
    }

    /// Verify a session token and return its claims.
    ///
    /// Bad signature, expiry, and structural garbage are rejected uniformly.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, InvalidSessionToken> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<SessionClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(reason = %e, "Session token rejected");
                InvalidSessionToken
            })
    }
}

/// Extract the bearer token from request headers.
fn extract_bearer(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Extractor for the authenticated user on protected routes.
///
/// Verifies the bearer session token and loads the user row. Any failure is
/// a uniform 401 with no distinguishing detail.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer(&parts.headers).ok_or(StatusCode::UNAUTHORIZED)?;

        let claims = state
            .sessions
            .verify(token)
            .map_err(|_| StatusCode::UNAUTHORIZED)?;

        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(&claims.sub)
            .fetch_optional(&state.db)
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        user.map(AuthUser).ok_or(StatusCode::UNAUTHORIZED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> SessionSigner {
        SessionSigner::new("test-server-secret", 7)
    }

    #[test]
    fn test_issue_verify_roundtrip() {
        let signer = signer();
        let token = signer.issue("user-1", "octocat").unwrap();
        let claims = signer.verify(&token).unwrap();

        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.username, "octocat");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = signer().issue("user-1", "octocat").unwrap();
        let other = SessionSigner::new("different-secret", 7);
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        // Sign a claim whose expiry is already in the past
        let signer = signer();
        let now = Utc::now();
        let claims = SessionClaims {
            sub: "user-1".to_string(),
            username: "octocat".to_string(),
            iat: (now - Duration::days(8)).timestamp(),
            exp: (now - Duration::days(1)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-server-secret"),
        )
        .unwrap();

        assert!(signer.verify(&token).is_err());
    }

    #[test]
    fn test_malformed_token_rejected() {
        let signer = signer();
        assert!(signer.verify("").is_err());
        assert!(signer.verify("not-a-jwt").is_err());
        assert!(signer.verify("a.b.c").is_err());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let signer = signer();
        let token = signer.issue("user-1", "octocat").unwrap();

        // Replace the claims segment without re-signing
        let parts: Vec<&str> = token.split('.').collect();
        let tampered = format!("{}.eyJzdWIiOiJhdHRhY2tlciJ9.{}", parts[0], parts[2]);
        assert!(signer.verify(&tampered).is_err());
    }
}
