//! Configuration management for the mailer

use crate::domain::{
    EventKind, MailgunSettings, SenderConfig, SmtpSettings, TransportConfig,
};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use validator::Validate;

/// Subject used for password resets when no override is configured
pub const DEFAULT_RESET_SUBJECT: &str = "Password reset - Jellyfin";

/// Application configuration, built once at startup
#[derive(Debug, Clone)]
pub struct Config {
    /// Sender identity
    pub sender: SenderConfig,
    /// Resolved delivery transport
    pub transport: TransportConfig,
    /// Content composition settings
    pub content: ContentConfig,
    /// Logging configuration
    pub telemetry: TelemetryConfig,
}

/// Everything the composer needs, independent of the transport
#[derive(Debug, Clone)]
pub struct ContentConfig {
    /// Free text injected into invite and reset bodies
    pub message: String,
    /// Base URL that invite codes are appended to
    pub invite_url_base: String,
    pub invite_subject: String,
    /// Override for the password reset subject
    pub reset_subject: Option<String>,
    /// Replace the user's address with "n/a" in account-created notices
    pub redact_address: bool,
    /// strftime pattern for dates
    pub date_pattern: String,
    /// strftime pattern for times
    pub time_pattern: String,
    pub templates: TemplateConfig,
}

impl ContentConfig {
    pub fn reset_subject(&self) -> &str {
        self.reset_subject.as_deref().unwrap_or(DEFAULT_RESET_SUBJECT)
    }
}

/// Rich and plain template files for one event kind
#[derive(Debug, Clone, PartialEq)]
pub struct TemplatePair {
    pub html: PathBuf,
    pub text: PathBuf,
}

impl TemplatePair {
    fn in_dir(dir: &Path, stem: &str) -> Self {
        Self {
            html: dir.join(format!("{stem}.html")),
            text: dir.join(format!("{stem}.txt")),
        }
    }
}

/// Template locations for every event kind
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateConfig {
    pub invite: TemplatePair,
    pub expiry: TemplatePair,
    pub created: TemplatePair,
    pub reset: TemplatePair,
}

impl TemplateConfig {
    /// Default file names (`invite.html`, `invite.txt`, ...) under `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            invite: TemplatePair::in_dir(dir, "invite"),
            expiry: TemplatePair::in_dir(dir, "expiry"),
            created: TemplatePair::in_dir(dir, "created"),
            reset: TemplatePair::in_dir(dir, "reset"),
        }
    }

    pub fn for_kind(&self, kind: EventKind) -> &TemplatePair {
        match kind {
            EventKind::Invite => &self.invite,
            EventKind::ExpiryNotice => &self.expiry,
            EventKind::AccountCreated => &self.created,
            EventKind::PasswordReset => &self.reset,
        }
    }

    fn for_kind_mut(&mut self, kind: EventKind) -> &mut TemplatePair {
        match kind {
            EventKind::Invite => &mut self.invite,
            EventKind::ExpiryNotice => &mut self.expiry,
            EventKind::AccountCreated => &mut self.created,
            EventKind::PasswordReset => &mut self.reset,
        }
    }

    /// Apply `<PREFIX>_TEMPLATE_HTML` / `<PREFIX>_TEMPLATE_TEXT` overrides
    fn apply_env_overrides(&mut self) {
        let prefixes = [
            (EventKind::Invite, "INVITE"),
            (EventKind::ExpiryNotice, "EXPIRY"),
            (EventKind::AccountCreated, "CREATED"),
            (EventKind::PasswordReset, "RESET"),
        ];
        for (kind, prefix) in prefixes {
            let pair = self.for_kind_mut(kind);
            if let Ok(path) = env::var(format!("{prefix}_TEMPLATE_HTML")) {
                pair.html = PathBuf::from(path);
            }
            if let Ok(path) = env::var(format!("{prefix}_TEMPLATE_TEXT")) {
                pair.text = PathBuf::from(path);
            }
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// "json" or "text"
    pub log_format: String,
}

impl TelemetryConfig {
    /// Load logging settings on their own so logging can start before the rest
    pub fn from_env() -> Self {
        Self {
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string()),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|s| matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let sender = SenderConfig {
            address: env::var("EMAIL_ADDRESS").context("EMAIL_ADDRESS is required")?,
            display_name: env::var("EMAIL_FROM_NAME").unwrap_or_else(|_| "Jellyfin".to_string()),
        };
        sender.validate().context("Invalid EMAIL_ADDRESS")?;

        let method = env::var("EMAIL_METHOD").unwrap_or_default();
        let transport = TransportConfig::resolve(
            &method,
            &sender.address,
            MailgunSettings {
                api_key: env::var("MAILGUN_API_KEY").unwrap_or_default(),
                api_url: env_non_empty("MAILGUN_API_URL"),
            },
            SmtpSettings {
                server: env_non_empty("SMTP_SERVER"),
                port: env_non_empty("SMTP_PORT")
                    .map(|p| p.trim().parse::<u16>())
                    .transpose()
                    .context("Invalid SMTP_PORT")?,
                encryption: env_non_empty("SMTP_ENCRYPTION"),
                username: env_non_empty("SMTP_USERNAME"),
                password: env::var("SMTP_PASSWORD").ok(),
            },
        )
        .context("Invalid email transport configuration")?;

        let mut templates = TemplateConfig::in_dir(
            env::var("EMAIL_TEMPLATE_DIR").unwrap_or_else(|_| "templates".to_string()),
        );
        templates.apply_env_overrides();

        Ok(Self {
            sender,
            transport,
            content: ContentConfig {
                message: env::var("EMAIL_MESSAGE").unwrap_or_default(),
                invite_url_base: env::var("INVITE_URL_BASE").unwrap_or_default(),
                invite_subject: env::var("INVITE_SUBJECT").unwrap_or_default(),
                reset_subject: env_non_empty("PASSWORD_RESET_SUBJECT"),
                redact_address: env_flag("EMAIL_REDACT_ADDRESS"),
                date_pattern: env::var("EMAIL_DATE_PATTERN")
                    .unwrap_or_else(|_| "%d/%m/%y".to_string()),
                time_pattern: env::var("EMAIL_TIME_PATTERN")
                    .unwrap_or_else(|_| "%H:%M".to_string()),
                templates,
            },
            telemetry: TelemetryConfig::from_env(),
        })
    }
}
