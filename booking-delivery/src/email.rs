use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use booking_core::config::EmailConfig;

use crate::mailer::Mailer;

const RESEND_API_URL: &str = "https://api.resend.com/emails";

fn html_escape(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            '&' => "&amp;".to_string(),
            '"' => "&quot;".to_string(),
            '\'' => "&#x27;".to_string(),
            _ => c.to_string(),
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct ResendEmailRequest {
    from: String,
    to: Vec<String>,
    subject: String,
    html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResendEmailResponse {
    id: String,
}

/// Email delivery through the Resend HTTP API. Without credentials in the
/// config the mailer stays up but every send is a logged no-op, so local
/// runs work with no account.
pub struct ResendMailer {
    client: Option<Arc<reqwest::Client>>,
    api_key: Option<String>,
    from_email: Option<String>,
}

impl ResendMailer {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let (client, api_key, from_email) = if let (Some(api_key), Some(from_email)) =
            (&config.resend_api_key, &config.resend_from_email)
        {
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .map_err(|e| anyhow!("failed to create HTTP client: {}", e))?;
            tracing::info!("Resend email client initialized");
            (
                Some(Arc::new(client)),
                Some(api_key.clone()),
                Some(from_email.clone()),
            )
        } else {
            tracing::warn!("email delivery disabled (missing Resend configuration)");
            (None, None, None)
        };

        Ok(Self {
            client,
            api_key,
            from_email,
        })
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let (client, api_key, from_email) = match (&self.client, &self.api_key, &self.from_email) {
            (Some(c), Some(k), Some(f)) => (c, k, f),
            _ => {
                tracing::debug!("email not configured, skipping");
                return Ok(());
            }
        };

        let html = format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
</head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, 'Helvetica Neue', Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
    <div style="background-color: #f8f9fa; border-radius: 8px; padding: 24px; margin-bottom: 20px;">
        <h1 style="margin: 0 0 16px 0; font-size: 24px; color: #212529;">{}</h1>
        <p style="margin: 0; font-size: 16px; color: #495057; white-space: pre-line;">{}</p>
    </div>
    <p style="font-size: 14px; color: #6c757d; margin-top: 20px;">
        This is a notification from the room booking system.
    </p>
</body>
</html>"#,
            html_escape(subject),
            html_escape(body)
        );

        let request = ResendEmailRequest {
            from: from_email.clone(),
            to: vec![to.to_string()],
            subject: subject.to_string(),
            html,
            text: Some(body.to_string()),
        };

        let response = client
            .post(RESEND_API_URL)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow!("failed to send HTTP request to Resend: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(anyhow!(
                "Resend API returned error status {}: {}",
                status,
                error_text
            ));
        }

        let email_response: ResendEmailResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("failed to parse Resend API response: {}", e))?;

        tracing::debug!(to, email_id = %email_response.id, "email sent via Resend");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_escape_covers_markup_characters() {
        assert_eq!(
            html_escape(r#"<b>"A&B"</b>'s room"#),
            "&lt;b&gt;&quot;A&amp;B&quot;&lt;/b&gt;&#x27;s room"
        );
    }

    #[tokio::test]
    async fn unconfigured_mailer_is_a_no_op() {
        let mailer = ResendMailer::new(&EmailConfig {
            resend_api_key: None,
            resend_from_email: None,
        })
        .unwrap();
        mailer.send("ana@example.com", "Hi", "body").await.unwrap();
    }
}
