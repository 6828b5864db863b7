//! Outbound email notifications over SMTP.
//!
//! Email is strictly best effort: an unconfigured or failing transport is
//! logged and never fails the request that triggered the send.

use anyhow::Result;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::EmailConfig;

pub struct Mailer {
    config: EmailConfig,
}

impl Mailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }

    /// Send the first-login welcome email. Failures are logged and swallowed.
    pub async fn send_welcome(&self, to_email: &str, username: &str, frontend_url: &str) {
        if !self.is_enabled() {
            tracing::debug!("Email not configured, skipping welcome email");
            return;
        }

        let subject = "Welcome to Repodeck!";
        let html_body = render_welcome_html(username, frontend_url);
        let text_body = render_welcome_text(username, frontend_url);

        if let Err(e) = self.send_email(to_email, subject, &html_body, &text_body).await {
            tracing::warn!(error = %e, "Failed to send welcome email");
        }
    }

    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<()> {
        let smtp_host = self
            .config
            .smtp_host
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("SMTP host not configured"))?;
        let from_address = self
            .config
            .from_address
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("From address not configured"))?;

        let from: Mailbox = match &self.config.from_name {
            Some(name) => format!("{} <{}>", name, from_address).parse()?,
            None => from_address.parse()?,
        };

        let message = Message::builder()
            .from(from)
            .to(to_email.parse()?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(smtp_host)?
                .port(self.config.smtp_port);

        if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        builder.build().send(message).await?;

        tracing::debug!(to = to_email, "Email sent");
        Ok(())
    }
}

fn render_welcome_html(username: &str, frontend_url: &str) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h1>Welcome to Repodeck!</h1>
  <p>Hi {username},</p>
  <p>Your GitHub account is connected. From your dashboard you can now:</p>
  <ul>
    <li>Manage all your repositories in one place</li>
    <li>Track stars, forks, and language breakdowns</li>
    <li>Follow repository activity in real time</li>
    <li>Manage collaborators</li>
  </ul>
  <p><a href="{frontend_url}" style="background: #3b82f6; color: white; padding: 12px 24px; text-decoration: none; border-radius: 6px;">Open dashboard</a></p>
</div>"#
    )
}

fn render_welcome_text(username: &str, frontend_url: &str) -> String {
    format!(
        "Welcome to Repodeck!\n\nHi {username},\n\nYour GitHub account is connected. \
         Open your dashboard at {frontend_url} to manage repositories, track stats, \
         and follow activity.\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_mailer_is_disabled() {
        let mailer = Mailer::new(EmailConfig::default());
        assert!(!mailer.is_enabled());
    }

    #[test]
    fn test_configured_mailer_is_enabled() {
        let config = EmailConfig {
            smtp_host: Some("smtp.example.com".to_string()),
            from_address: Some("noreply@example.com".to_string()),
            ..Default::default()
        };
        assert!(Mailer::new(config).is_enabled());
    }

    #[test]
    fn test_welcome_bodies_mention_user() {
        let html = render_welcome_html("octocat", "https://deck.example.com");
        assert!(html.contains("octocat"));
        assert!(html.contains("https://deck.example.com"));

        let text = render_welcome_text("octocat", "https://deck.example.com");
        assert!(text.contains("octocat"));
    }
}
