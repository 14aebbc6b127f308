//! Direct SMTP transport (STARTTLS submission).

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::error::{AppError, Result};
use crate::notify::{Email, Transport};

/// Transport submitting mail to an SMTP relay.
pub struct SmtpTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpTransport {
    /// Build a STARTTLS relay with login credentials.
    pub fn new(host: &str, port: u16, user: &str, password: &str, timeout_secs: u64) -> Result<Self> {
        let credentials = Credentials::new(user.to_string(), password.to_string());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
            .port(port)
            .credentials(credentials)
            .timeout(Some(Duration::from_secs(timeout_secs)))
            .build();
        Ok(Self { mailer })
    }
}

/// Assemble a multipart message: plain/html alternative plus attachments.
pub fn build_message(email: &Email) -> Result<Message> {
    let from: Mailbox = email.from.parse()?;
    let to: Mailbox = email.to.parse()?;

    let mut body = MultiPart::mixed().multipart(MultiPart::alternative_plain_html(
        email.text_body.clone(),
        email.html_body.clone(),
    ));

    for file in &email.attachments {
        let content_type = ContentType::parse(file.content_type)
            .map_err(|e| AppError::notify("smtp", format!("{}: {e}", file.filename)))?;
        body = body.singlepart(
            Attachment::new(file.filename.clone()).body(file.bytes.clone(), content_type),
        );
    }

    Ok(Message::builder()
        .from(from)
        .to(to)
        .subject(email.subject.clone())
        .multipart(body)?)
}

#[async_trait]
impl Transport for SmtpTransport {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, email: &Email) -> Result<()> {
        let message = build_message(email)?;
        let response = self.mailer.send(message).await?;
        log::debug!("SMTP server replied {}", response.code());
        Ok(())
    }
}
