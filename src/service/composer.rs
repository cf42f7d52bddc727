//! Notification content composition
//!
//! Renders the rich and plain template pair for an event into a
//! [`NotificationContent`]. Templates are read from disk on every call so edits
//! apply to the next notification without a restart.

use crate::config::ContentConfig;
use crate::domain::{
    AccountCreatedEvent, EventData, ExpiryNoticeEvent, Invite, InviteEvent, NotificationContent,
    PasswordReset, PasswordResetEvent,
};
use crate::email::{Escape, TemplateEngine};
use crate::error::{NotifyError, Result};
use crate::service::duration::{format_datetime, format_expiry};

pub const EXPIRY_NOTICE_SUBJECT: &str = "Notice: Invite expired";
pub const ACCOUNT_CREATED_SUBJECT: &str = "Notice: User created";

/// Placeholder substituted for the address when redaction is enabled
pub const REDACTED_ADDRESS: &str = "n/a";

/// Builds notification content from event data and templates
#[derive(Debug, Clone)]
pub struct ContentComposer {
    config: ContentConfig,
}

impl ContentComposer {
    pub fn new(config: ContentConfig) -> Self {
        Self { config }
    }

    /// Compose subject, rich body and plain body for one event.
    ///
    /// Fails without producing content if the event is missing a required field
    /// or either template cannot be loaded or rendered.
    pub async fn compose(&self, event: &EventData) -> Result<NotificationContent> {
        event.validate()?;

        let kind = event.kind();
        let (subject, engine) = self.prepare(event);
        let templates = self.config.templates.for_kind(kind);

        let rich_body = engine
            .load_and_render(&templates.html, Escape::Html)
            .await
            .map_err(|e| NotifyError::template(&templates.html, e))?;
        let plain_body = engine
            .load_and_render(&templates.text, Escape::None)
            .await
            .map_err(|e| NotifyError::template(&templates.text, e))?;

        metrics::counter!("mailer_notifications_composed_total", "kind" => kind.as_str())
            .increment(1);
        tracing::debug!(kind = %kind, "Composed notification");

        Ok(NotificationContent {
            subject,
            rich_body,
            plain_body,
        })
    }

    /// Invite for a prospective user, from a stored invite record
    pub async fn compose_invite(&self, invite: &Invite) -> Result<NotificationContent> {
        self.compose(&EventData::Invite(InviteEvent {
            code: invite.code.clone(),
            expiry: invite.valid_till,
            message: self.config.message.clone(),
            url_base: self.config.invite_url_base.clone(),
        }))
        .await
    }

    /// Admin notice that `invite` expired
    pub async fn compose_expiry(&self, invite: &Invite) -> Result<NotificationContent> {
        self.compose(&EventData::ExpiryNotice(ExpiryNoticeEvent {
            code: invite.code.clone(),
            expiry_display: self.format_display(invite.valid_till),
        }))
        .await
    }

    /// Admin notice that `invite` was used to create `username`
    pub async fn compose_created(
        &self,
        invite: &Invite,
        username: &str,
        address: &str,
    ) -> Result<NotificationContent> {
        self.compose(&EventData::AccountCreated(AccountCreatedEvent {
            code: invite.code.clone(),
            username: username.to_string(),
            address: address.to_string(),
            created_display: self.format_display(invite.created),
        }))
        .await
    }

    /// Password reset PIN for a pending reset
    pub async fn compose_reset(&self, reset: &PasswordReset) -> Result<NotificationContent> {
        self.compose(&EventData::PasswordReset(PasswordResetEvent {
            username: reset.username.clone(),
            expiry: reset.expiry,
            pin: reset.pin.clone(),
            message: self.config.message.clone(),
        }))
        .await
    }

    fn format_display(&self, ts: chrono::NaiveDateTime) -> String {
        format_datetime(ts, &self.config.date_pattern, &self.config.time_pattern)
    }

    /// Subject and substitution mapping for an event
    fn prepare(&self, event: &EventData) -> (String, TemplateEngine) {
        let config = &self.config;
        let mut engine = TemplateEngine::new();

        let subject = match event {
            EventData::Invite(invite) => {
                // Invite expiry is stored in server-local time
                let expiry = format_expiry(
                    invite.expiry,
                    false,
                    &config.date_pattern,
                    &config.time_pattern,
                );
                engine
                    .set("expiry_date", expiry.date)
                    .set("expiry_time", expiry.time)
                    .set("expires_in", expiry.expires_in)
                    .set("invite_link", invite.invite_link())
                    .set("message", invite.message.as_str());
                config.invite_subject.clone()
            }
            EventData::ExpiryNotice(notice) => {
                engine
                    .set("code", notice.code.as_str())
                    .set("expiry", notice.expiry_display.as_str());
                EXPIRY_NOTICE_SUBJECT.to_string()
            }
            EventData::AccountCreated(created) => {
                let address = if config.redact_address {
                    REDACTED_ADDRESS
                } else {
                    created.address.as_str()
                };
                engine
                    .set("code", created.code.as_str())
                    .set("username", created.username.as_str())
                    .set("address", address)
                    .set("time", created.created_display.as_str());
                ACCOUNT_CREATED_SUBJECT.to_string()
            }
            EventData::PasswordReset(reset) => {
                // Reset expiry is stored in UTC
                let expiry = format_expiry(
                    reset.expiry,
                    true,
                    &config.date_pattern,
                    &config.time_pattern,
                );
                engine
                    .set("username", reset.username.as_str())
                    .set("expiry_date", expiry.date)
                    .set("expiry_time", expiry.time)
                    .set("expires_in", expiry.expires_in)
                    .set("pin", reset.pin.as_str())
                    .set("message", reset.message.as_str());
                config.reset_subject().to_string()
            }
        };

        (subject, engine)
    }
}
