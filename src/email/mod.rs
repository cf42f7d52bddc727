//! Mail delivery for notifications
//!
//! This module provides sending capabilities with two interchangeable transports:
//! - SMTP (using lettre), with implicit TLS or STARTTLS
//! - Mailgun HTTP API (using reqwest)

pub mod mailgun;
pub mod provider;
pub mod smtp;
pub mod templates;

pub use mailgun::MailgunTransport;
pub use provider::{DeliveryError, MailTransport, DEFAULT_SEND_TIMEOUT};
pub use smtp::SmtpMailTransport;
pub use templates::{Escape, TemplateEngine, TemplateError};
