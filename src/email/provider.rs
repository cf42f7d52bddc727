//! Mail transport trait and delivery error types

use crate::domain::{DeliveryReceipt, EmailMessage};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Deadline applied to every send, on both transports
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Delivery error types
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Rate limited")]
    RateLimited,
}

/// A configured way of delivering one message
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Deliver a message. Exactly one attempt, no retry.
    async fn send(&self, message: &EmailMessage) -> Result<DeliveryReceipt, DeliveryError>;

    /// Check connectivity and credentials without sending
    async fn test_connection(&self) -> Result<(), DeliveryError>;

    /// Get the transport name
    fn transport_name(&self) -> &'static str;
}
