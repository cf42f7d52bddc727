//! Delivery of composed notifications through the configured transport

use crate::domain::{
    DeliveryReceipt, EmailAddress, EmailMessage, NotificationContent, SenderConfig,
    TransportConfig,
};
use crate::email::{DeliveryError, MailTransport, MailgunTransport, SmtpMailTransport};
use crate::error::{NotifyError, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Transport selected once at construction
#[derive(Clone)]
enum Selected {
    Transport(Arc<dyn MailTransport>),
    Unsupported(String),
}

/// Sends notification content to a single recipient
#[derive(Clone)]
pub struct Dispatcher {
    selected: Selected,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let transport = match &self.selected {
            Selected::Transport(t) => t.transport_name(),
            Selected::Unsupported(_) => "unsupported",
        };
        f.debug_struct("Dispatcher")
            .field("transport", &transport)
            .finish()
    }
}

impl Dispatcher {
    /// Build the transport described by `config`
    pub fn from_config(config: &TransportConfig, sender: &SenderConfig) -> Result<Self> {
        let selected = match config {
            TransportConfig::Smtp(smtp) => {
                let transport = SmtpMailTransport::from_config(smtp, sender).map_err(|e| {
                    NotifyError::Configuration(format!("Failed to create SMTP transport: {}", e))
                })?;
                Selected::Transport(Arc::new(transport))
            }
            TransportConfig::Mailgun(mailgun) => {
                let transport = MailgunTransport::from_config(mailgun, sender).map_err(|e| {
                    NotifyError::Configuration(format!(
                        "Failed to create Mailgun transport: {}",
                        e
                    ))
                })?;
                Selected::Transport(Arc::new(transport))
            }
            TransportConfig::Unsupported { method } => Selected::Unsupported(method.clone()),
        };

        Ok(Self { selected })
    }

    /// Use an already constructed transport
    pub fn with_transport(transport: Arc<dyn MailTransport>) -> Self {
        Self {
            selected: Selected::Transport(transport),
        }
    }

    fn transport(&self) -> Result<&Arc<dyn MailTransport>> {
        match &self.selected {
            Selected::Transport(transport) => Ok(transport),
            Selected::Unsupported(method) => Err(NotifyError::Configuration(format!(
                "unsupported email method {method:?}, expected \"smtp\" or \"mailgun\""
            ))),
        }
    }

    /// Send `content` to `recipient`. One attempt; failures are returned, never retried.
    pub async fn send(
        &self,
        content: &NotificationContent,
        recipient: &str,
    ) -> Result<DeliveryReceipt> {
        let transport = self.transport()?;
        let name = transport.transport_name();

        let message = EmailMessage::new(
            EmailAddress::new(recipient),
            content.subject.as_str(),
            content.rich_body.as_str(),
            content.plain_body.as_str(),
        );

        let span = tracing::info_span!("deliver", transport = name);
        let started = Instant::now();
        let result = transport.send(&message).instrument(span).await;

        metrics::histogram!("mailer_delivery_duration_seconds", "transport" => name)
            .record(started.elapsed().as_secs_f64());
        metrics::counter!(
            "mailer_deliveries_total",
            "transport" => name,
            "outcome" => outcome_label(&result)
        )
        .increment(1);

        match result {
            Ok(receipt) => {
                tracing::info!(
                    transport = name,
                    message_id = receipt.message_id.as_deref().unwrap_or("-"),
                    "Notification delivered"
                );
                Ok(receipt)
            }
            Err(e) => {
                tracing::warn!(transport = name, error = %e, "Notification delivery failed");
                Err(e.into())
            }
        }
    }

    /// Check that the transport is reachable and accepts our credentials
    pub async fn test_connection(&self) -> Result<()> {
        self.transport()?.test_connection().await?;
        Ok(())
    }
}

fn outcome_label(result: &std::result::Result<DeliveryReceipt, DeliveryError>) -> &'static str {
    match result {
        Ok(_) => "delivered",
        Err(DeliveryError::Timeout(_)) => "timeout",
        Err(DeliveryError::AuthenticationFailed(_)) => "auth_failed",
        Err(_) => "failed",
    }
}
