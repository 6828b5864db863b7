//! Authentication endpoints: GitHub OAuth flow, personal-access-token login,
//! and session introspection.
//!
//! Both login paths end the same way: the GitHub token is encrypted before it
//! touches the database, the user row is upserted by stable GitHub id, and a
//! signed session token is issued.

use axum::{
    extract::{Query, State},
    response::Redirect,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::db::{find_user_by_github_id, upsert_user, User, UserResponse};
use crate::github::{exchange_oauth_code, GitHubClient};
use crate::AppState;

use super::error::ApiError;

const OAUTH_SCOPES: &str = "repo,user,admin:repo_hook";

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenLoginRequest {
    pub username: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

/// Redirect the browser to GitHub's OAuth authorization page.
pub async fn github_redirect(State(state): State<Arc<AppState>>) -> Result<Redirect, ApiError> {
    let client_id = state
        .config
        .github
        .client_id
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("GitHub OAuth is not configured"))?;

    let url = format!(
        "https://github.com/login/oauth/authorize?client_id={}&scope={}",
        urlencoding::encode(client_id),
        urlencoding::encode(OAUTH_SCOPES)
    );
    Ok(Redirect::temporary(&url))
}

/// OAuth callback: exchange the code, store the encrypted token, and bounce
/// back to the frontend with a session token.
pub async fn github_callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OAuthCallbackQuery>,
) -> Result<Redirect, ApiError> {
    let code = query
        .code
        .ok_or_else(|| ApiError::bad_request("Authorization code required"))?;

    let (client_id, client_secret) = match (
        state.config.github.client_id.as_deref(),
        state.config.github.client_secret.as_deref(),
    ) {
        (Some(id), Some(secret)) => (id, secret),
        _ => return Err(ApiError::bad_request("GitHub OAuth is not configured")),
    };

    let access_token = exchange_oauth_code(client_id, client_secret, &code)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "OAuth code exchange failed");
            ApiError::unauthorized("Authentication failed")
        })?;

    let github_user = GitHubClient::new(access_token.clone())
        .get_user()
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Failed to fetch GitHub user after OAuth exchange");
            ApiError::unauthorized("Authentication failed")
        })?;

    let user = persist_login(&state, &github_user.id.to_string(), &github_user.login,
        github_user.email.as_deref(), &access_token)
        .await?;

    let session = state
        .sessions
        .issue(&user.id, &user.username)
        .map_err(|_| ApiError::internal("Failed to issue session token"))?;

    Ok(Redirect::temporary(&format!(
        "{}/auth/callback?token={}",
        state.config.server.frontend_url,
        urlencoding::encode(&session)
    )))
}

/// Login with a personal access token.
pub async fn token_login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TokenLoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if request.username.is_empty() || request.token.is_empty() {
        return Err(ApiError::bad_request("Username and token are required"));
    }

    // Validate the token against GitHub before storing anything
    let github_user = GitHubClient::new(request.token.clone())
        .get_user()
        .await
        .map_err(|e| {
            tracing::debug!(error = %e, "Token validation against GitHub failed");
            ApiError::unauthorized("Invalid token or username")
        })?;

    if github_user.login != request.username {
        return Err(ApiError::unauthorized("Invalid token or username"));
    }

    let user = persist_login(&state, &github_user.id.to_string(), &github_user.login,
        github_user.email.as_deref(), &request.token)
        .await?;

    let session = state
        .sessions
        .issue(&user.id, &user.username)
        .map_err(|_| ApiError::internal("Failed to issue session token"))?;

    Ok(Json(LoginResponse {
        token: session,
        user: user.into(),
    }))
}

/// Encrypt the GitHub token, upsert the user, and send a welcome email on
/// first login. Token rotation happens here on every re-login.
async fn persist_login(
    state: &AppState,
    github_id: &str,
    username: &str,
    email: Option<&str>,
    access_token: &str,
) -> Result<User, ApiError> {
    let encrypted = state
        .cipher
        .encrypt(access_token)
        .map_err(|_| ApiError::internal("Failed to protect access token"))?;

    let is_new = find_user_by_github_id(&state.db, github_id).await?.is_none();
    let user = upsert_user(&state.db, github_id, username, email, &encrypted).await?;

    if is_new {
        if let Some(to) = user.email.as_deref() {
            state
                .mailer
                .send_welcome(to, &user.username, &state.config.server.frontend_url)
                .await;
        }
    }

    Ok(user)
}

/// Current authenticated user.
pub async fn me(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(user.into())
}

/// Sessions are stateless; logout is an acknowledgment for the client.
pub async fn logout() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Logged out successfully" }))
}
