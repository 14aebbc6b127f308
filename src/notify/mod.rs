//! Email notification of new offers.
//!
//! One transport is chosen from the environment at start-up:
//!
//! | Transport | Required                                          | Optional               |
//! |-----------|---------------------------------------------------|------------------------|
//! | SendGrid  | `SENDGRID_API_KEY`, `TO_EMAIL`                    | `FROM_EMAIL`           |
//! | SMTP      | `SMTP_HOST`, `SMTP_USER`, `SMTP_PASS`, `TO_EMAIL` | `SMTP_PORT`, `FROM_EMAIL` |
//!
//! Dispatch failures are reported, never propagated: by the time mail goes
//! out the master store has already been appended to.

pub mod render;
pub mod sendgrid;
pub mod smtp;

use std::fmt;

use async_trait::async_trait;
use lettre::message::Mailbox;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::{Config, Offer};
use crate::storage::ExportedFile;

pub use sendgrid::SendGridTransport;
pub use smtp::SmtpTransport;

/// Default SMTP submission port (STARTTLS).
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// A rendered email ready for dispatch.
#[derive(Debug, Clone)]
pub struct Email {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    pub attachments: Vec<ExportedFile>,
}

/// A way of delivering an email.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn send(&self, email: &Email) -> Result<()>;
}

/// Transport credentials read from the environment.
#[derive(Clone, PartialEq, Eq)]
pub enum TransportSettings {
    SendGrid {
        api_key: String,
        to: String,
        from: String,
    },
    Smtp {
        host: String,
        port: u16,
        user: String,
        password: String,
        to: String,
        from: String,
    },
}

impl fmt::Debug for TransportSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SendGrid { to, from, .. } => f
                .debug_struct("SendGrid")
                .field("to", to)
                .field("from", from)
                .finish_non_exhaustive(),
            Self::Smtp {
                host,
                port,
                user,
                to,
                from,
                ..
            } => f
                .debug_struct("Smtp")
                .field("host", host)
                .field("port", port)
                .field("user", user)
                .field("to", to)
                .field("from", from)
                .finish_non_exhaustive(),
        }
    }
}

impl TransportSettings {
    /// Read settings from process environment variables.
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through a lookup function.
    ///
    /// Returns `Ok(None)` when no transport variable is set at all, and a
    /// configuration error when a transport is only partially configured.
    pub fn from_lookup<F>(lookup: F) -> Result<Option<Self>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let to = get("TO_EMAIL");
        let from = get("FROM_EMAIL");

        if let Some(api_key) = get("SENDGRID_API_KEY") {
            let to = to.ok_or_else(|| {
                AppError::config("SENDGRID_API_KEY is set but TO_EMAIL is missing")
            })?;
            let from = from.unwrap_or_else(|| to.clone());
            Self::check_addresses(&to, &from)?;
            return Ok(Some(Self::SendGrid { api_key, to, from }));
        }

        match (get("SMTP_HOST"), get("SMTP_USER"), get("SMTP_PASS")) {
            (None, None, None) => match to {
                Some(_) => Err(AppError::config(
                    "TO_EMAIL is set but neither SENDGRID_API_KEY nor SMTP_HOST/SMTP_USER/SMTP_PASS are",
                )),
                None => Ok(None),
            },
            (Some(host), Some(user), Some(password)) => {
                let to = to
                    .ok_or_else(|| AppError::config("SMTP is configured but TO_EMAIL is missing"))?;
                let from = from.unwrap_or_else(|| to.clone());
                let port = match get("SMTP_PORT") {
                    Some(raw) => raw.parse::<u16>().map_err(|e| {
                        AppError::config(format!("Invalid SMTP_PORT '{raw}': {e}"))
                    })?,
                    None => DEFAULT_SMTP_PORT,
                };
                Self::check_addresses(&to, &from)?;
                Ok(Some(Self::Smtp {
                    host,
                    port,
                    user,
                    password,
                    to,
                    from,
                }))
            }
            _ => Err(AppError::config(
                "Incomplete SMTP configuration: SMTP_HOST, SMTP_USER and SMTP_PASS are all required",
            )),
        }
    }

    fn check_addresses(to: &str, from: &str) -> Result<()> {
        for (name, value) in [("TO_EMAIL", to), ("FROM_EMAIL", from)] {
            value.parse::<Mailbox>().map_err(|e| {
                AppError::config(format!("{name} '{value}' is not a valid address: {e}"))
            })?;
        }
        Ok(())
    }

    pub fn recipient(&self) -> &str {
        match self {
            Self::SendGrid { to, .. } | Self::Smtp { to, .. } => to,
        }
    }

    pub fn sender(&self) -> &str {
        match self {
            Self::SendGrid { from, .. } | Self::Smtp { from, .. } => from,
        }
    }

    /// Build the transport these settings describe.
    pub fn build(&self, client: Client, timeout_secs: u64) -> Result<Box<dyn Transport>> {
        Ok(match self {
            Self::SendGrid { api_key, .. } => Box::new(SendGridTransport::new(client, api_key)),
            Self::Smtp {
                host,
                port,
                user,
                password,
                ..
            } => Box::new(SmtpTransport::new(host, *port, user, password, timeout_secs)?),
        })
    }
}

/// What happened to the notification of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent { transport: &'static str },
    Skipped(&'static str),
    Failed(String),
}

/// Renders and dispatches the new-offers email.
pub struct Notifier {
    transport: Option<Box<dyn Transport>>,
    to: String,
    from: String,
    subject: String,
    site_name: String,
    send_when_empty: bool,
    max_text_lines: usize,
}

impl Notifier {
    pub fn new(
        transport: Box<dyn Transport>,
        to: impl Into<String>,
        from: impl Into<String>,
        config: &Config,
    ) -> Self {
        Self {
            transport: Some(transport),
            to: to.into(),
            from: from.into(),
            ..Self::disabled(config)
        }
    }

    /// A notifier that never sends.
    pub fn disabled(config: &Config) -> Self {
        Self {
            transport: None,
            to: String::new(),
            from: String::new(),
            subject: config.notify.subject.clone(),
            site_name: config.site.name.clone(),
            send_when_empty: config.notify.send_when_empty,
            max_text_lines: config.notify.max_text_lines,
        }
    }

    /// Build from environment settings; `None` yields a disabled notifier.
    pub fn from_settings(
        settings: Option<&TransportSettings>,
        client: Client,
        config: &Config,
    ) -> Result<Self> {
        match settings {
            Some(settings) => {
                let transport = settings.build(client, config.fetcher.timeout_secs)?;
                Ok(Self::new(
                    transport,
                    settings.recipient(),
                    settings.sender(),
                    config,
                ))
            }
            None => Ok(Self::disabled(config)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    /// Render the email for a set of new offers.
    pub fn compose(&self, offers: &[Offer], attachments: Vec<ExportedFile>) -> Email {
        Email {
            to: self.to.clone(),
            from: self.from.clone(),
            subject: self.subject.clone(),
            text_body: render::text_body(offers, self.max_text_lines),
            html_body: render::html_body(offers, &self.site_name),
            attachments,
        }
    }

    /// Send the digest. Transport errors are logged and reported, not returned.
    pub async fn notify(&self, offers: &[Offer], attachments: Vec<ExportedFile>) -> NotifyOutcome {
        let Some(transport) = &self.transport else {
            log::debug!("No email transport configured, skipping notification");
            return NotifyOutcome::Skipped("no transport configured");
        };

        if offers.is_empty() && !self.send_when_empty {
            log::info!("No new offers, notification skipped");
            return NotifyOutcome::Skipped("no new offers");
        }

        let email = self.compose(offers, attachments);
        match transport.send(&email).await {
            Ok(()) => {
                log::info!("Email sent via {} to {}", transport.name(), email.to);
                NotifyOutcome::Sent {
                    transport: transport.name(),
                }
            }
            Err(error) => {
                log::warn!("Email via {} failed: {}", transport.name(), error);
                NotifyOutcome::Failed(error.to_string())
            }
        }
    }
}
