//! GitHub OAuth code exchange.

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: Option<String>,
    error_description: Option<String>,
}

/// Exchange an OAuth authorization code for a user access token.
pub async fn exchange_oauth_code(
    client_id: &str,
    client_secret: &str,
    code: &str,
) -> Result<String> {
    let client = reqwest::Client::new();
    let response = client
        .post("https://github.com/login/oauth/access_token")
        .header("Accept", "application/json")
        .header("User-Agent", "Repodeck")
        .json(&serde_json::json!({
            "client_id": client_id,
            "client_secret": client_secret,
            "code": code,
        }))
        .send()
        .await
        .context("Failed to reach GitHub OAuth endpoint")?;

    if !response.status().is_success() {
        anyhow::bail!("GitHub OAuth exchange failed: {}", response.status());
    }

    let body: AccessTokenResponse = response
        .json()
        .await
        .context("Failed to parse OAuth token response")?;

    body.access_token.ok_or_else(|| {
        anyhow::anyhow!(
            "GitHub did not return an access token: {}",
            body.error_description.unwrap_or_default()
        )
    })
}
