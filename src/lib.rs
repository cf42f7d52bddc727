//! Auth Mailer - transactional notifications for account management
//!
//! This crate composes invite, invite-expiry, account-created and password-reset
//! notifications from template pairs and delivers them over SMTP or the Mailgun
//! HTTP API.

pub mod config;
pub mod domain;
pub mod email;
pub mod error;
pub mod service;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use error::{NotifyError, Result};
pub use service::{ContentComposer, Dispatcher};
