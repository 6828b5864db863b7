use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub webhooks: WebhookConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Frontend origin, used for the OAuth redirect and CORS
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            frontend_url: default_frontend_url(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_frontend_url() -> String {
    "http://localhost:5173".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Server secret used for token encryption key derivation and session
    /// signing. Required: startup fails without it.
    pub server_secret: Option<String>,
    /// Session token lifetime in days
    #[serde(default = "default_session_ttl_days")]
    pub session_ttl_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            server_secret: None,
            session_ttl_days: default_session_ttl_days(),
        }
    }
}

fn default_session_ttl_days() -> i64 {
    7
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GitHubConfig {
    /// OAuth client ID (optional; token login works without OAuth)
    pub client_id: Option<String>,
    /// OAuth client secret
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WebhookConfig {
    /// Shared secret for verifying GitHub webhook signatures (HMAC-SHA256)
    pub github_secret: Option<String>,
    /// Accept deliveries without a configured secret. Insecure; intended for
    /// local development only, and logged loudly when enabled.
    #[serde(default)]
    pub allow_unverified: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub from_address: Option<String>,
    pub from_name: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            from_address: None,
            from_name: None,
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

impl EmailConfig {
    pub fn is_configured(&self) -> bool {
        self.smtp_host.is_some() && self.from_address.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&content).with_context(|| "Failed to parse configuration file")?
        } else {
            info!("No config file found, using defaults");
            Config::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would silently weaken security at runtime.
    fn validate(&self) -> Result<()> {
        let secret = self
            .auth
            .server_secret
            .as_deref()
            .map(str::trim)
            .unwrap_or("");
        if secret.is_empty() {
            bail!(
                "auth.server_secret is required: it keys access-token encryption \
                 and session signing. Refusing to start without it."
            );
        }

        if self.webhooks.github_secret.is_none() && self.webhooks.allow_unverified {
            tracing::warn!(
                "webhooks.allow_unverified is enabled: inbound webhook deliveries \
                 will NOT be authenticated. Do not run this in production."
            );
        }

        Ok(())
    }

    /// The validated server secret.
    pub fn server_secret(&self) -> &str {
        self.auth
            .server_secret
            .as_deref()
            .expect("validated at load time")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_server_secret_rejected() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_blank_server_secret_rejected() {
        let config: Config = toml::from_str("[auth]\nserver_secret = \"  \"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_minimal_config_accepted() {
        let config: Config =
            toml::from_str("[auth]\nserver_secret = \"s3cret\"\n").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.server_secret(), "s3cret");
        assert_eq!(config.auth.session_ttl_days, 7);
        assert_eq!(config.server.port, 5000);
        assert!(!config.webhooks.allow_unverified);
    }

    #[test]
    fn test_webhook_section_parses() {
        let config: Config = toml::from_str(
            "[auth]\nserver_secret = \"s\"\n[webhooks]\ngithub_secret = \"hook\"\n",
        )
        .unwrap();
        assert_eq!(config.webhooks.github_secret.as_deref(), Some("hook"));
    }
}
