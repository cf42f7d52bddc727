//! Notification domain models

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// The kinds of notification this crate can compose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Invite,
    ExpiryNotice,
    AccountCreated,
    PasswordReset,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invite => "invite",
            Self::ExpiryNotice => "expiry_notice",
            Self::AccountCreated => "account_created",
            Self::PasswordReset => "password_reset",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composed message content: subject plus rich (HTML) and plain bodies
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationContent {
    pub subject: String,
    pub rich_body: String,
    pub plain_body: String,
}

/// Invite sent to a prospective user
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct InviteEvent {
    #[validate(length(min = 1))]
    pub code: String,
    pub expiry: NaiveDateTime,
    pub message: String,
    #[validate(length(min = 1))]
    pub url_base: String,
}

impl InviteEvent {
    /// `<url_base>/<code>`
    pub fn invite_link(&self) -> String {
        format!("{}/{}", self.url_base.trim_end_matches('/'), self.code)
    }
}

/// Admin notice that an invite expired unused
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct ExpiryNoticeEvent {
    #[validate(length(min = 1))]
    pub code: String,
    pub expiry_display: String,
}

/// Admin notice that an invite was used to create an account
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct AccountCreatedEvent {
    #[validate(length(min = 1))]
    pub code: String,
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub address: String,
    pub created_display: String,
}

/// Password reset PIN for an existing user
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct PasswordResetEvent {
    #[validate(length(min = 1))]
    pub username: String,
    pub expiry: NaiveDateTime,
    #[validate(length(min = 1))]
    pub pin: String,
    pub message: String,
}

/// Data for exactly one notification kind
#[derive(Debug, Clone, PartialEq)]
pub enum EventData {
    Invite(InviteEvent),
    ExpiryNotice(ExpiryNoticeEvent),
    AccountCreated(AccountCreatedEvent),
    PasswordReset(PasswordResetEvent),
}

impl EventData {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Invite(_) => EventKind::Invite,
            Self::ExpiryNotice(_) => EventKind::ExpiryNotice,
            Self::AccountCreated(_) => EventKind::AccountCreated,
            Self::PasswordReset(_) => EventKind::PasswordReset,
        }
    }

    /// Check that every required field of the active variant is present
    pub fn validate(&self) -> Result<(), validator::ValidationErrors> {
        match self {
            Self::Invite(e) => e.validate(),
            Self::ExpiryNotice(e) => e.validate(),
            Self::AccountCreated(e) => e.validate(),
            Self::PasswordReset(e) => e.validate(),
        }
    }
}

/// An invite record as stored by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invite {
    pub code: String,
    pub valid_till: NaiveDateTime,
    pub created: NaiveDateTime,
}

/// A pending password reset as stored by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordReset {
    pub username: String,
    pub pin: String,
    pub expiry: NaiveDateTime,
}
