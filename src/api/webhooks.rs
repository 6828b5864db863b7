//! Inbound GitHub webhook endpoint.
//!
//! The signature is verified over the raw body before anything is parsed;
//! responses expose status codes only, never which check failed.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;

use crate::sync::{EventKind, SyncError, SyncOutcome};
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Verify a GitHub webhook signature (X-Hub-Signature-256 header).
///
/// Computes HMAC-SHA256 over the raw, unparsed body and compares against the
/// `sha256=<hex>` header value in constant time.
fn verify_signature(secret: &str, signature_header: &str, payload: &[u8]) -> bool {
    let signature = match signature_header.strip_prefix("sha256=") {
        Some(sig) => sig,
        None => return false,
    };

    let expected = match hex::decode(signature) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(payload);

    // verify_slice is constant-time
    mac.verify_slice(&expected).is_ok()
}

pub async fn github_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, StatusCode> {
    match state.config.webhooks.github_secret.as_deref() {
        Some(secret) => {
            let signature = headers
                .get("X-Hub-Signature-256")
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| {
                    tracing::warn!("Webhook delivery missing X-Hub-Signature-256 header");
                    StatusCode::UNAUTHORIZED
                })?;

            if !verify_signature(secret, signature, &body) {
                tracing::warn!("Webhook signature verification failed");
                return Err(StatusCode::UNAUTHORIZED);
            }
        }
        None if state.config.webhooks.allow_unverified => {
            tracing::warn!(
                "Accepting UNVERIFIED webhook delivery (webhooks.allow_unverified is set)"
            );
        }
        None => {
            tracing::warn!(
                "Rejecting webhook delivery: no webhooks.github_secret configured \
                 and allow_unverified is off"
            );
            return Err(StatusCode::UNAUTHORIZED);
        }
    }

    let kind = headers
        .get("X-GitHub-Event")
        .and_then(|v| v.to_str().ok())
        .map(EventKind::parse)
        .ok_or(StatusCode::BAD_REQUEST)?;

    match state.sync.handle(kind, &body).await {
        Ok(SyncOutcome::Applied(action)) => {
            tracing::info!(action = %action, "Webhook event synchronized");
            Ok(StatusCode::OK)
        }
        Ok(SyncOutcome::NoMatchingUser) | Ok(SyncOutcome::Ignored) => Ok(StatusCode::OK),
        Err(SyncError::Payload(e)) => {
            tracing::warn!(error = %e, "Malformed webhook payload");
            Err(StatusCode::BAD_REQUEST)
        }
        Err(SyncError::Db(e)) => {
            tracing::error!(error = %e, "Failed to synchronize webhook event");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_valid_signature_accepted() {
        let body = br#"{"action":"created"}"#;
        let header = sign("hook-secret", body);
        assert!(verify_signature("hook-secret", &header, body));
    }

    #[test]
    fn test_mutated_body_rejected() {
        let body = br#"{"action":"created"}"#;
        let header = sign("hook-secret", body);
        let mutated = br#"{"action":"cremated"}"#;
        assert!(!verify_signature("hook-secret", &header, mutated));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let body = br#"{"action":"created"}"#;
        let header = sign("other-secret", body);
        assert!(!verify_signature("hook-secret", &header, body));
    }

    #[test]
    fn test_missing_prefix_rejected() {
        let body = br#"{}"#;
        let header = sign("hook-secret", body);
        let bare = header.strip_prefix("sha256=").unwrap();
        assert!(!verify_signature("hook-secret", bare, body));
    }

    #[test]
    fn test_non_hex_signature_rejected() {
        assert!(!verify_signature("hook-secret", "sha256=zzzz", b"{}"));
    }

    #[test]
    fn test_known_vector() {
        // Independently computed: HMAC-SHA256("secret", "hello")
        let expected =
            "sha256=88aab3ede8d3adf94d26ab90d3bafd4a2083070c3bcce9c014ee04a443847c0b";
        assert!(verify_signature("secret", expected, b"hello"));
    }
}
