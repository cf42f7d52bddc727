//! Mailgun HTTP API transport
//!
//! Sends through `POST {api_base}/{domain}/messages` with HTTP basic auth
//! (`api:<key>`). Every call runs under a hard deadline.

use super::provider::{DeliveryError, MailTransport, DEFAULT_SEND_TIMEOUT};
use crate::domain::{DeliveryReceipt, EmailMessage, MailgunConfig, SenderConfig};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

/// Mailgun API transport
pub struct MailgunTransport {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    domain: String,
    from: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct MailgunResponse {
    id: Option<String>,
}

impl MailgunTransport {
    /// Create a new Mailgun transport from configuration
    pub fn from_config(config: &MailgunConfig, sender: &SenderConfig) -> Result<Self, DeliveryError> {
        Self::with_timeout(config, sender, DEFAULT_SEND_TIMEOUT)
    }

    /// Create a transport whose calls are abandoned after `timeout`
    pub fn with_timeout(
        config: &MailgunConfig,
        sender: &SenderConfig,
        timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| DeliveryError::InvalidConfiguration(e.to_string()))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            domain: config.domain.clone(),
            from: sender.mailbox(),
            timeout,
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/{}/messages", self.api_base, self.domain)
    }

    fn domain_url(&self) -> String {
        format!("{}/domains/{}", self.api_base, self.domain)
    }

    async fn post_message(&self, message: &EmailMessage) -> Result<DeliveryReceipt, DeliveryError> {
        let to = message
            .to
            .iter()
            .map(|addr| addr.mailbox())
            .collect::<Vec<_>>()
            .join(", ");

        let form = [
            ("from", self.from.as_str()),
            ("to", to.as_str()),
            ("subject", message.subject.as_str()),
            ("text", message.text_body.as_str()),
            ("html", message.html_body.as_str()),
        ];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth("api", Some(&self.api_key))
            .form(&form)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|e| e.to_string());
            return Err(map_status(status, body));
        }

        let parsed: MailgunResponse = response
            .json()
            .await
            .map_err(|e| DeliveryError::SendFailed(format!("Unexpected API response: {}", e)))?;

        Ok(DeliveryReceipt {
            transport: self.transport_name(),
            message_id: parsed.id,
        })
    }
}

fn map_transport_error(err: reqwest::Error) -> DeliveryError {
    if err.is_timeout() || err.is_connect() {
        DeliveryError::ConnectionError(err.to_string())
    } else {
        DeliveryError::SendFailed(err.to_string())
    }
}

fn map_status(status: StatusCode, body: String) -> DeliveryError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            DeliveryError::AuthenticationFailed(format!("{}: {}", status, body))
        }
        StatusCode::TOO_MANY_REQUESTS => DeliveryError::RateLimited,
        _ => DeliveryError::SendFailed(format!("{}: {}", status, body)),
    }
}

#[async_trait]
impl MailTransport for MailgunTransport {
    async fn send(&self, message: &EmailMessage) -> Result<DeliveryReceipt, DeliveryError> {
        if message.to.is_empty() {
            return Err(DeliveryError::InvalidMessage(
                "No recipients specified".to_string(),
            ));
        }

        tokio::time::timeout(self.timeout, self.post_message(message))
            .await
            .map_err(|_| DeliveryError::Timeout(self.timeout))?
    }

    async fn test_connection(&self) -> Result<(), DeliveryError> {
        let request = self
            .client
            .get(self.domain_url())
            .basic_auth("api", Some(&self.api_key))
            .send();

        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| DeliveryError::Timeout(self.timeout))?
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_else(|e| e.to_string());
            Err(map_status(status, body))
        }
    }

    fn transport_name(&self) -> &'static str {
        "mailgun"
    }
}
