//! SMTP mail transport implementation using lettre

use super::provider::{DeliveryError, MailTransport, DEFAULT_SEND_TIMEOUT};
use crate::domain::{DeliveryReceipt, EmailMessage, SenderConfig, SmtpConfig, SmtpEncryption};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::time::Duration;

/// Direct SMTP delivery over implicit TLS or STARTTLS
pub struct SmtpMailTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    encryption: SmtpEncryption,
    timeout: Duration,
}

impl SmtpMailTransport {
    /// Create a new SMTP transport from configuration
    pub fn from_config(config: &SmtpConfig, sender: &SenderConfig) -> Result<Self, DeliveryError> {
        Self::with_timeout(config, sender, DEFAULT_SEND_TIMEOUT)
    }

    /// Create a transport whose connect, read and write operations are bounded by `timeout`
    pub fn with_timeout(
        config: &SmtpConfig,
        sender: &SenderConfig,
        timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        // Server name verification uses the configured host; certificates are always checked
        let tls_parameters = TlsParameters::new(config.host.clone())
            .map_err(|e| DeliveryError::InvalidConfiguration(e.to_string()))?;
        Self::with_tls_parameters(config, sender, timeout, tls_parameters)
    }

    /// Create a transport that verifies the server against `tls_parameters`
    /// instead of the system defaults. Used to trust a private CA.
    #[doc(hidden)]
    pub fn with_tls_parameters(
        config: &SmtpConfig,
        sender: &SenderConfig,
        timeout: Duration,
        tls_parameters: TlsParameters,
    ) -> Result<Self, DeliveryError> {
        let tls = match config.encryption {
            SmtpEncryption::ImplicitTls => Tls::Wrapper(tls_parameters),
            SmtpEncryption::StartTls => Tls::Required(tls_parameters),
        };

        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(config.host.as_str())
            .port(config.port)
            .tls(tls)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(timeout))
            .build();

        let from = sender.mailbox().parse().map_err(|e| {
            DeliveryError::InvalidConfiguration(format!("Invalid from address: {}", e))
        })?;

        Ok(Self {
            transport,
            from,
            encryption: config.encryption,
            timeout,
        })
    }

    fn build_message(&self, message: &EmailMessage) -> Result<Message, DeliveryError> {
        if message.to.is_empty() {
            return Err(DeliveryError::InvalidMessage(
                "No recipients specified".to_string(),
            ));
        }

        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(&message.subject);

        for addr in &message.to {
            let mailbox: Mailbox = addr.mailbox().parse().map_err(|e| {
                DeliveryError::InvalidMessage(format!("Invalid to address {}: {}", addr.email, e))
            })?;
            builder = builder.to(mailbox);
        }

        builder
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(message.text_body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(message.html_body.clone()),
                    ),
            )
            .map_err(|e| DeliveryError::InvalidMessage(e.to_string()))
    }

    fn classify(&self, err: lettre::transport::smtp::Error) -> DeliveryError {
        if err.is_timeout() {
            return DeliveryError::Timeout(self.timeout);
        }
        classify_smtp_error(&err.to_string(), err.is_permanent())
    }
}

/// Map an SMTP failure onto a delivery error by its reply text.
fn classify_smtp_error(error_msg: &str, permanent: bool) -> DeliveryError {
    let lowered = error_msg.to_lowercase();
    let has_code = |code: &str| {
        error_msg
            .split(|c: char| !c.is_ascii_digit())
            .any(|segment| segment == code)
    };

    if lowered.contains("authentication") || error_msg.contains("AUTH") || has_code("535") {
        DeliveryError::AuthenticationFailed(error_msg.to_string())
    } else if permanent {
        DeliveryError::SendFailed(error_msg.to_string())
    } else if lowered.contains("connection")
        || lowered.contains("timed out")
        || lowered.contains("tls")
        || lowered.contains("network")
    {
        DeliveryError::ConnectionError(error_msg.to_string())
    } else {
        DeliveryError::SendFailed(error_msg.to_string())
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(&self, message: &EmailMessage) -> Result<DeliveryReceipt, DeliveryError> {
        let email = self.build_message(message)?;

        tracing::debug!(encryption = ?self.encryption, "Opening SMTP session");

        // lettre bounds each socket operation; the outer deadline bounds the whole session
        let response = tokio::time::timeout(self.timeout, self.transport.send(email))
            .await
            .map_err(|_| DeliveryError::Timeout(self.timeout))?
            .map_err(|e| self.classify(e))?;

        let message_id = response.message().next().map(|s| s.to_string());
        Ok(DeliveryReceipt {
            transport: self.transport_name(),
            message_id,
        })
    }

    async fn test_connection(&self) -> Result<(), DeliveryError> {
        let connected = tokio::time::timeout(self.timeout, self.transport.test_connection())
            .await
            .map_err(|_| DeliveryError::Timeout(self.timeout))?
            .map_err(|e| self.classify(e))?;

        if connected {
            Ok(())
        } else {
            Err(DeliveryError::ConnectionError(
                "SMTP server did not accept the connection".to_string(),
            ))
        }
    }

    fn transport_name(&self) -> &'static str {
        "smtp"
    }
}
