//! SendGrid v3 mail API transport.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::notify::{Email, Transport};

pub const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

#[derive(Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct Personalization<'a> {
    to: Vec<Address<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    content_type: &'a str,
    value: &'a str,
}

#[derive(Serialize)]
struct AttachmentPayload<'a> {
    content: String,
    filename: &'a str,
    #[serde(rename = "type")]
    content_type: &'a str,
    disposition: &'a str,
}

#[derive(Serialize)]
struct MailPayload<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: Address<'a>,
    subject: &'a str,
    content: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<AttachmentPayload<'a>>,
}

impl<'a> MailPayload<'a> {
    fn from_email(email: &'a Email) -> Self {
        Self {
            personalizations: vec![Personalization {
                to: vec![Address { email: &email.to }],
            }],
            from: Address { email: &email.from },
            subject: &email.subject,
            content: vec![
                Content {
                    content_type: "text/plain",
                    value: &email.text_body,
                },
                Content {
                    content_type: "text/html",
                    value: &email.html_body,
                },
            ],
            attachments: email
                .attachments
                .iter()
                .map(|file| AttachmentPayload {
                    content: STANDARD.encode(&file.bytes),
                    filename: &file.filename,
                    content_type: file.content_type,
                    disposition: "attachment",
                })
                .collect(),
        }
    }
}

/// Transport posting to the SendGrid mail API.
pub struct SendGridTransport {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl SendGridTransport {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self::with_endpoint(client, api_key, SENDGRID_ENDPOINT)
    }

    /// Use a different API endpoint, e.g. a regional or mock server.
    pub fn with_endpoint(
        client: Client,
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Transport for SendGridTransport {
    fn name(&self) -> &'static str {
        "sendgrid"
    }

    async fn send(&self, email: &Email) -> Result<()> {
        let payload = MailPayload::from_email(email);
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::notify(
                self.name(),
                format!("HTTP status {status}: {}", body.trim()),
            ));
        }

        log::debug!("SendGrid accepted message with status {}", status);
        Ok(())
    }
}
