//! Outbound email.
//!
//! The auth flows talk to a [`MailSender`]; delivery is someone else's
//! problem. [`HttpMailer`] posts to an HTTP mail API, [`LogMailer`]
//! logs instead of sending for local development. An absent sender
//! (`Option::None` at the call site) models "mail not configured".

use async_trait::async_trait;
use rust_embed::Embed;
use serde::Serialize;
use tracing::info;
use url::Url;

/// Error delivering a message.
#[derive(Debug)]
pub struct MailError(pub String);

impl std::fmt::Display for MailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Mail error: {}", self.0)
    }
}

impl std::error::Error for MailError {}

/// Email delivery abstraction.
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Deliver a message or return an error.
    async fn send(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), MailError>;
}

/// Local dev sender that logs the message instead of sending it.
pub struct LogMailer;

#[async_trait]
impl MailSender for LogMailer {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        _html_body: &str,
    ) -> Result<(), MailError> {
        info!(to = %to, subject = %subject, body = %text_body, "Mail send stub");
        Ok(())
    }
}

#[derive(Serialize)]
struct OutboundMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    html: &'a str,
}

/// Sender that delivers through an HTTP mail API (JSON POST with a
/// bearer key, the shape most transactional mail providers accept).
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(endpoint: Url, api_key: &str, from: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key: api_key.to_string(),
            from: from.to_string(),
        }
    }
}

#[async_trait]
impl MailSender for HttpMailer {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), MailError> {
        let message = OutboundMessage {
            from: &self.from,
            to,
            subject,
            text: text_body,
            html: html_body,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&message)
            .send()
            .await
            .map_err(|e| MailError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MailError(format!(
                "mail API returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Embedded HTML mail templates.
#[derive(Embed)]
#[folder = "templates/mail/"]
struct MailTemplates;

fn render(name: &str, placeholder: &str, value: &str) -> String {
    let file = MailTemplates::get(name).expect("embedded mail template");
    let html = String::from_utf8_lossy(&file.data);
    html.replace(placeholder, value)
}

/// Render the password-reset email body.
pub fn render_reset_password(reset_url: &str) -> String {
    render("reset_password.html", "{{reset_url}}", reset_url)
}

/// Render the email-verification email body.
pub fn render_verify_email(verify_url: &str) -> String {
    render("verify_email.html", "{{verify_url}}", verify_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_template_embeds_url() {
        let html = render_reset_password("https://example.com/reset-password?token=abc");
        assert!(html.contains("https://example.com/reset-password?token=abc"));
        assert!(!html.contains("{{reset_url}}"));
    }

    #[test]
    fn test_verify_template_embeds_url() {
        let html = render_verify_email("https://example.com/verify-email?token=abc");
        assert!(html.contains("https://example.com/verify-email?token=abc"));
        assert!(!html.contains("{{verify_url}}"));
    }
}
