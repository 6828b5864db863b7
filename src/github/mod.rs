//! GitHub integration: REST client, OAuth exchange, and the credential
//! gateway that turns a stored encrypted token into a usable client.

mod client;
mod oauth;

pub use client::{
    Collaborator, GitHubClient, GitHubRepo, GitHubUser, NewRepository, RepositoryUpdate, UserStats,
};
pub use oauth::exchange_oauth_code;

use thiserror::Error;

use crate::crypto::TokenCipher;
use crate::db::User;

/// The user's stored token is missing, tampered with, or was encrypted under
/// a different server secret. Cipher internals never surface here.
#[derive(Debug, Error)]
#[error("invalid access token")]
pub struct InvalidAccessToken;

/// Decrypt a user's stored GitHub token.
///
/// The plaintext must live only for the single outbound call being prepared:
/// callers hand it straight to [`GitHubClient`] and drop it. It is never
/// cached, logged, or persisted.
pub fn access_token(cipher: &TokenCipher, user: &User) -> Result<String, InvalidAccessToken> {
    let blob = user.access_token.as_deref().ok_or_else(|| {
        tracing::warn!(user_id = %user.id, "User has no stored access token");
        InvalidAccessToken
    })?;

    cipher.decrypt(blob).map_err(|_| {
        tracing::warn!(user_id = %user.id, "Failed to decrypt stored access token");
        InvalidAccessToken
    })
}

/// Build a GitHub client for a user, decrypting their stored token on demand.
pub fn client_for(cipher: &TokenCipher, user: &User) -> Result<GitHubClient, InvalidAccessToken> {
    Ok(GitHubClient::new(access_token(cipher, user)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with_token(token: Option<String>) -> User {
        User {
            id: "user-1".to_string(),
            github_id: "123".to_string(),
            username: "octocat".to_string(),
            email: None,
            access_token: token,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_gateway_roundtrip() {
        let cipher = TokenCipher::from_secret("server-secret");
        let blob = cipher.encrypt("ghp_plaintext").unwrap();
        let user = user_with_token(Some(blob));

        assert_eq!(access_token(&cipher, &user).unwrap(), "ghp_plaintext");
    }

    #[test]
    fn test_missing_token_is_invalid() {
        let cipher = TokenCipher::from_secret("server-secret");
        let user = user_with_token(None);
        assert!(access_token(&cipher, &user).is_err());
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let blob = TokenCipher::from_secret("old-secret")
            .encrypt("ghp_plaintext")
            .unwrap();
        let user = user_with_token(Some(blob));

        let cipher = TokenCipher::from_secret("rotated-secret");
        assert!(access_token(&cipher, &user).is_err());
    }

    #[test]
    fn test_garbage_blob_is_invalid() {
        let cipher = TokenCipher::from_secret("server-secret");
        let user = user_with_token(Some("not:a:valid-blob".to_string()));
        assert!(access_token(&cipher, &user).is_err());
    }
}
