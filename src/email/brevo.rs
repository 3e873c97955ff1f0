use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, error, info};

use super::Dispatcher;
use crate::config::EmailConfig;

const DEFAULT_BREVO_ENDPOINT: &str = "https://api.brevo.com/v3";

const SUBJECT: &str = "Your Meeting Summary from WrapUp";

pub struct BrevoDispatcher {
    http: Client,
    api_key: String,
    endpoint: String,
    sender_name: String,
    sender_email: String,
}

impl BrevoDispatcher {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .context("api_key is required for the Brevo dispatcher")?;

        let endpoint = config
            .api_endpoint
            .as_deref()
            .unwrap_or(DEFAULT_BREVO_ENDPOINT)
            .trim_end_matches('/')
            .to_string();

        info!("Initialized Brevo dispatcher with endpoint: {}", endpoint);

        Ok(Self {
            http: Client::new(),
            api_key,
            endpoint,
            sender_name: config.sender_name.clone(),
            sender_email: config.sender_email.clone(),
        })
    }

    fn html_body(summary_text: &str) -> String {
        format!(
            "<html><body>\
             <h2>Here is your meeting summary:</h2>\
             <pre style='font-family: monospace; white-space: pre-wrap; padding: 10px; \
             border: 1px solid #eee; background-color: #f9f9f9;'>{summary_text}</pre>\
             <p>The full summary is also attached to this email.</p>\
             <p>Thank you for using WrapUp!</p>\
             </body></html>"
        )
    }
}

#[async_trait]
impl Dispatcher for BrevoDispatcher {
    async fn deliver(&self, to_address: &str, body_text: &str, attachment: &Path) -> Result<()> {
        // Read at send time: the artifact must still exist on disk.
        let attachment_bytes = tokio::fs::read(attachment)
            .await
            .with_context(|| format!("Failed to read attachment {:?}", attachment))?;

        let attachment_name = attachment
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("summary.txt")
            .to_string();

        let request = SendEmailRequest {
            sender: EmailAddress {
                name: Some(self.sender_name.clone()),
                email: self.sender_email.clone(),
            },
            to: vec![EmailAddress {
                name: None,
                email: to_address.to_string(),
            }],
            subject: SUBJECT.to_string(),
            html_content: Self::html_body(body_text),
            attachment: vec![Attachment {
                content: BASE64.encode(&attachment_bytes),
                name: attachment_name,
            }],
        };

        debug!("Sending summary email to {}", to_address);

        let response = self
            .http
            .post(format!("{}/smtp/email", self.endpoint))
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to send email via Brevo")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Brevo send failed with status {}: {}", status, body);
            return Err(anyhow::anyhow!(
                "Brevo send failed with status {}: {}",
                status,
                body
            ));
        }

        info!("Summary email sent to {}", to_address);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct SendEmailRequest {
    sender: EmailAddress,
    to: Vec<EmailAddress>,
    subject: String,
    #[serde(rename = "htmlContent")]
    html_content: String,
    attachment: Vec<Attachment>,
}

#[derive(Debug, Serialize)]
struct EmailAddress {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    email: String,
}

#[derive(Debug, Serialize)]
struct Attachment {
    content: String,
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_api_key() {
        let config = EmailConfig::default();
        assert!(BrevoDispatcher::new(&config).is_err());
    }

    #[test]
    fn test_html_body_embeds_summary() {
        let body = BrevoDispatcher::html_body("1. Executive Summary: shipped");
        assert!(body.contains("1. Executive Summary: shipped"));
        assert!(body.contains("attached to this email"));
    }

    #[tokio::test]
    async fn test_deliver_fails_on_missing_attachment() {
        let config = EmailConfig {
            api_key: Some("key".into()),
            ..EmailConfig::default()
        };
        let dispatcher = BrevoDispatcher::new(&config).unwrap();

        let result = dispatcher
            .deliver("a@b.com", "summary", Path::new("/nonexistent/summary.txt"))
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_request_serialization_uses_brevo_field_names() {
        let request = SendEmailRequest {
            sender: EmailAddress {
                name: Some("WrapUp".into()),
                email: "summary@wrapup.ai".into(),
            },
            to: vec![EmailAddress {
                name: None,
                email: "a@b.com".into(),
            }],
            subject: SUBJECT.into(),
            html_content: "<html></html>".into(),
            attachment: vec![Attachment {
                content: "Zm9v".into(),
                name: "summary.txt".into(),
            }],
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"htmlContent\""));
        assert!(json.contains("\"content\":\"Zm9v\""));
        assert!(!json.contains("\"name\":null"));
    }
}
