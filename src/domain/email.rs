//! Mail transport domain types

use crate::error::{NotifyError, Result};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Default Mailgun API root (the client appends `/<domain>/messages`)
pub const DEFAULT_MAILGUN_API_BASE: &str = "https://api.mailgun.net/v3";

/// Transport configuration, resolved once at startup
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportConfig {
    /// Direct SMTP delivery
    Smtp(SmtpConfig),

    /// Mailgun-compatible HTTP API
    Mailgun(MailgunConfig),

    /// Configured method is not one we know how to deliver with
    Unsupported { method: String },
}

impl TransportConfig {
    /// Resolve the configured method into a concrete transport.
    ///
    /// Unknown methods resolve to [`TransportConfig::Unsupported`] so that sends
    /// report a configuration error instead of failing startup.
    pub fn resolve(
        method: &str,
        sender_address: &str,
        mailgun: MailgunSettings,
        smtp: SmtpSettings,
    ) -> Result<Self> {
        match method.trim() {
            "mailgun" => {
                let domain = sending_domain(sender_address)?;
                let raw_base = mailgun
                    .api_url
                    .unwrap_or_else(|| DEFAULT_MAILGUN_API_BASE.to_string());
                let api_base = normalize_api_base(&raw_base);
                url::Url::parse(&api_base).map_err(|e| {
                    NotifyError::Configuration(format!("invalid mailgun API URL {raw_base}: {e}"))
                })?;
                let config = MailgunConfig {
                    api_base,
                    api_key: mailgun.api_key,
                    domain,
                };
                config
                    .validate()
                    .map_err(|e| NotifyError::Configuration(e.to_string()))?;
                Ok(Self::Mailgun(config))
            }
            "smtp" => {
                let host = smtp
                    .server
                    .filter(|h| !h.trim().is_empty())
                    .ok_or_else(|| NotifyError::Configuration("SMTP server is required".into()))?;
                let encryption = match smtp.encryption.as_deref().map(str::trim) {
                    None | Some("") => SmtpEncryption::StartTls,
                    Some(value) => value.parse()?,
                };
                Ok(Self::Smtp(SmtpConfig {
                    host,
                    port: smtp.port.unwrap_or_else(|| encryption.default_port()),
                    encryption,
                    username: smtp
                        .username
                        .unwrap_or_else(|| sender_address.to_string()),
                    password: smtp.password.unwrap_or_default(),
                }))
            }
            other => {
                tracing::warn!(method = other, "Unsupported email method, sends will fail");
                Ok(Self::Unsupported {
                    method: other.to_string(),
                })
            }
        }
    }

    /// Get the transport type as a string
    pub fn transport_type(&self) -> &'static str {
        match self {
            Self::Smtp(_) => "smtp",
            Self::Mailgun(_) => "mailgun",
            Self::Unsupported { .. } => "unsupported",
        }
    }
}

/// Raw Mailgun settings as read from configuration
#[derive(Debug, Clone, Default)]
pub struct MailgunSettings {
    pub api_key: String,
    pub api_url: Option<String>,
}

/// Raw SMTP settings as read from configuration
#[derive(Debug, Clone, Default)]
pub struct SmtpSettings {
    pub server: Option<String>,
    pub port: Option<u16>,
    pub encryption: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// How the SMTP session is secured
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SmtpEncryption {
    /// TLS established before the SMTP greeting
    #[serde(rename = "ssl_tls")]
    ImplicitTls,
    /// Plaintext connection upgraded with STARTTLS before authenticating
    #[serde(rename = "starttls")]
    StartTls,
}

impl SmtpEncryption {
    pub fn default_port(self) -> u16 {
        match self {
            Self::ImplicitTls => 465,
            Self::StartTls => 587,
        }
    }
}

impl std::str::FromStr for SmtpEncryption {
    type Err = NotifyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ssl_tls" => Ok(Self::ImplicitTls),
            "starttls" => Ok(Self::StartTls),
            other => Err(NotifyError::Configuration(format!(
                "unknown SMTP encryption {other:?}, expected \"ssl_tls\" or \"starttls\""
            ))),
        }
    }
}

/// SMTP configuration for direct delivery
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SmtpConfig {
    /// SMTP server host, also used as the TLS server name
    pub host: String,

    /// SMTP server port (465 for implicit TLS, 587 for STARTTLS by default)
    pub port: u16,

    pub encryption: SmtpEncryption,

    /// Username for PLAIN authentication, defaults to the sender address
    pub username: String,

    pub password: String,
}

/// Mailgun API configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct MailgunConfig {
    /// API root, e.g. `https://api.mailgun.net/v3`
    #[validate(length(min = 1))]
    pub api_base: String,

    #[validate(length(min = 1))]
    pub api_key: String,

    /// Sending domain, taken from the sender address
    #[validate(length(min = 1))]
    pub domain: String,
}

/// Sender identity shared by all transports
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct SenderConfig {
    #[validate(email)]
    pub address: String,

    pub display_name: String,
}

impl SenderConfig {
    /// Sender as an address, named unless the display name is blank
    pub fn email_address(&self) -> EmailAddress {
        if self.display_name.trim().is_empty() {
            EmailAddress::new(self.address.as_str())
        } else {
            EmailAddress::with_name(self.address.as_str(), self.display_name.as_str())
        }
    }

    /// `"Name <address>"`, or the bare address when no name is configured
    pub fn mailbox(&self) -> String {
        self.email_address().mailbox()
    }
}

/// Email address with optional display name
#[derive(Debug, Clone, PartialEq)]
pub struct EmailAddress {
    pub email: String,
    pub name: Option<String>,
}

impl EmailAddress {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
        }
    }

    pub fn with_name(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: Some(name.into()),
        }
    }

    /// RFC 5322 mailbox form
    pub fn mailbox(&self) -> String {
        match &self.name {
            Some(name) => format!("{} <{}>", name, self.email),
            None => self.email.clone(),
        }
    }
}

/// Envelope handed to a transport for a single send
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: Vec<EmailAddress>,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

impl EmailMessage {
    pub fn new(
        to: EmailAddress,
        subject: impl Into<String>,
        html_body: impl Into<String>,
        text_body: impl Into<String>,
    ) -> Self {
        Self {
            to: vec![to],
            subject: subject.into(),
            html_body: html_body.into(),
            text_body: text_body.into(),
        }
    }
}

/// Result of a successful send
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReceipt {
    pub transport: &'static str,
    pub message_id: Option<String>,
}

/// Derive the API sending domain from the part of the sender address after `@`.
pub fn sending_domain(sender_address: &str) -> Result<String> {
    match sender_address.split_once('@') {
        Some((_, domain)) if !domain.is_empty() => Ok(domain.to_string()),
        _ => Err(NotifyError::Configuration(format!(
            "sender address {sender_address:?} has no domain"
        ))),
    }
}

/// Reduce a fully qualified messages endpoint to the API root.
///
/// `https://api.mailgun.net/v3/example.com/messages` becomes
/// `https://api.mailgun.net/v3`. URLs that do not end in a `messages`
/// segment are returned unchanged, so repeated application is a no-op.
pub fn normalize_api_base(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if !trimmed.ends_with("/messages") {
        return trimmed.to_string();
    }

    let mut base = trimmed;
    for _ in 0..2 {
        if let Some(idx) = base.rfind('/') {
            base = &base[..idx];
        }
    }
    base.to_string()
}
