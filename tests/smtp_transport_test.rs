//! SMTP transport tests against in-process fake servers
//! These tests don't require network access or a real mail server.

use auth_mailer::domain::{EmailAddress, EmailMessage, SenderConfig, SmtpConfig, SmtpEncryption};
use auth_mailer::email::{DeliveryError, MailTransport, SmtpMailTransport};
use lettre::transport::smtp::client::{Certificate, TlsParameters};
use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

fn create_test_transport(port: u16, encryption: SmtpEncryption) -> SmtpMailTransport {
    let config = SmtpConfig {
        host: "127.0.0.1".to_string(),
        port,
        encryption,
        username: "jellyfin@example.com".to_string(),
        password: "secret".to_string(),
    };
    let sender = SenderConfig {
        address: "jellyfin@example.com".to_string(),
        display_name: "Jellyfin".to_string(),
    };
    SmtpMailTransport::with_timeout(&config, &sender, TEST_TIMEOUT).unwrap()
}

fn test_message() -> EmailMessage {
    EmailMessage::new(
        EmailAddress::new("alice@example.com"),
        "Password reset - Jellyfin",
        "<p>PIN 418273</p>",
        "PIN 418273",
    )
}

/// Port with nothing listening on it
async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Plaintext server that greets, answers EHLO without STARTTLS and then
/// replies 250 to everything until the client hangs up.
async fn spawn_plaintext_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (reader, mut writer) = stream.into_split();
                let mut lines = BufReader::new(reader).lines();

                if writer.write_all(b"220 fake.local ESMTP\r\n").await.is_err() {
                    return;
                }
                while let Ok(Some(line)) = lines.next_line().await {
                    let reply: &[u8] = if line.to_uppercase().starts_with("EHLO") {
                        b"250-fake.local\r\n250 AUTH PLAIN LOGIN\r\n"
                    } else if line.to_uppercase().starts_with("QUIT") {
                        b"221 bye\r\n"
                    } else {
                        b"250 ok\r\n"
                    };
                    if writer.write_all(reply).await.is_err() {
                        return;
                    }
                }
            });
        }
    });

    port
}

#[tokio::test]
async fn test_connection_refused_starttls() {
    let port = closed_port().await;
    let transport = create_test_transport(port, SmtpEncryption::StartTls);

    let started = Instant::now();
    let result = transport.send(&test_message()).await;

    assert!(result.is_err(), "expected delivery error, got {:?}", result);
    assert!(started.elapsed() < TEST_TIMEOUT);
}

#[tokio::test]
async fn test_connection_refused_implicit_tls() {
    let port = closed_port().await;
    let transport = create_test_transport(port, SmtpEncryption::ImplicitTls);

    let result = transport.send(&test_message()).await;
    assert!(result.is_err(), "expected delivery error, got {:?}", result);
}

#[tokio::test]
async fn test_starttls_not_offered_fails_delivery() {
    let port = spawn_plaintext_server().await;
    let transport = create_test_transport(port, SmtpEncryption::StartTls);

    let result = transport.send(&test_message()).await;

    // The server would accept the message in plaintext; the transport must refuse
    match result {
        Err(DeliveryError::Timeout(_)) => panic!("expected an immediate failure, got a timeout"),
        Err(_) => {}
        Ok(receipt) => panic!("message was sent without TLS: {:?}", receipt),
    }
}

#[tokio::test]
async fn test_implicit_tls_against_plaintext_server_fails() {
    let port = spawn_plaintext_server().await;
    let transport = create_test_transport(port, SmtpEncryption::ImplicitTls);

    let result = transport.send(&test_message()).await;
    assert!(result.is_err(), "expected TLS failure, got {:?}", result);
}

#[tokio::test]
async fn test_connection_check_against_closed_port() {
    let port = closed_port().await;
    let transport = create_test_transport(port, SmtpEncryption::StartTls);

    assert!(transport.test_connection().await.is_err());
}

/// Server side of a private CA: an acceptor for 127.0.0.1 and the CA
/// certificate clients must trust.
struct TestPki {
    acceptor: TlsAcceptor,
    ca_pem: String,
}

fn test_pki() -> TestPki {
    let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
    ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    ca_params
        .distinguished_name
        .push(DnType::CommonName, "auth-mailer test CA");
    let ca_key = KeyPair::generate().unwrap();
    let ca_cert = ca_params.self_signed(&ca_key).unwrap();

    let leaf_key = KeyPair::generate().unwrap();
    let leaf_cert = CertificateParams::new(vec!["127.0.0.1".to_string()])
        .unwrap()
        .signed_by(&leaf_key, &ca_cert, &ca_key)
        .unwrap();

    let config = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .unwrap()
    .with_no_client_auth()
    .with_single_cert(
        vec![leaf_cert.der().clone()],
        PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(leaf_key.serialize_der())),
    )
    .unwrap();

    TestPki {
        acceptor: TlsAcceptor::from(Arc::new(config)),
        ca_pem: ca_cert.pem(),
    }
}

fn create_trusting_transport(
    port: u16,
    encryption: SmtpEncryption,
    ca_pem: &str,
) -> SmtpMailTransport {
    let config = SmtpConfig {
        host: "127.0.0.1".to_string(),
        port,
        encryption,
        username: "jellyfin@example.com".to_string(),
        password: "wrong-password".to_string(),
    };
    let sender = SenderConfig {
        address: "jellyfin@example.com".to_string(),
        display_name: "Jellyfin".to_string(),
    };
    let tls_parameters = TlsParameters::builder("127.0.0.1".to_string())
        .add_root_certificate(Certificate::from_pem(ca_pem.as_bytes()).unwrap())
        .build_rustls()
        .unwrap();
    SmtpMailTransport::with_tls_parameters(&config, &sender, TEST_TIMEOUT, tls_parameters)
        .unwrap()
}

/// SMTP dialog over an established (encrypted) stream that rejects every
/// AUTH attempt with 535.
async fn reject_credentials<S>(stream: S, greet: bool)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = BufReader::new(stream);
    if greet
        && (stream.write_all(b"220 fake.local ESMTP\r\n").await.is_err()
            || stream.flush().await.is_err())
    {
        return;
    }

    let mut line = String::new();
    loop {
        line.clear();
        match stream.read_line(&mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let command = line.to_uppercase();
        let reply: &[u8] = if command.starts_with("EHLO") {
            b"250-fake.local\r\n250 AUTH PLAIN LOGIN\r\n"
        } else if command.starts_with("AUTH") {
            b"535 5.7.8 Authentication credentials invalid\r\n"
        } else if command.starts_with("QUIT") {
            b"221 bye\r\n"
        } else {
            b"250 ok\r\n"
        };
        if stream.write_all(reply).await.is_err() || stream.flush().await.is_err() {
            return;
        }
    }
}

/// TLS from the first byte, then a session that rejects credentials
async fn spawn_implicit_tls_server(acceptor: TlsAcceptor) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                if let Ok(tls) = acceptor.accept(stream).await {
                    reject_credentials(tls, true).await;
                }
            });
        }
    });

    port
}

/// Plaintext greeting offering STARTTLS, then a session that rejects credentials
async fn spawn_starttls_server(acceptor: TlsAcceptor) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                let mut plain = BufReader::new(stream);
                if plain.write_all(b"220 fake.local ESMTP\r\n").await.is_err() {
                    return;
                }

                let mut line = String::new();
                loop {
                    line.clear();
                    match plain.read_line(&mut line).await {
                        Ok(0) | Err(_) => return,
                        Ok(_) => {}
                    }
                    let command = line.to_uppercase();
                    if command.starts_with("STARTTLS") {
                        if plain.write_all(b"220 2.0.0 Ready to start TLS\r\n").await.is_err() {
                            return;
                        }
                        break;
                    }
                    let reply: &[u8] = if command.starts_with("EHLO") {
                        b"250-fake.local\r\n250 STARTTLS\r\n"
                    } else if command.starts_with("QUIT") {
                        b"221 bye\r\n"
                    } else {
                        b"530 5.7.0 Must issue a STARTTLS command first\r\n"
                    };
                    if plain.write_all(reply).await.is_err() {
                        return;
                    }
                }

                if let Ok(tls) = acceptor.accept(plain.into_inner()).await {
                    reject_credentials(tls, false).await;
                }
            });
        }
    });

    port
}

#[tokio::test]
async fn test_rejected_credentials_implicit_tls() {
    let pki = test_pki();
    let port = spawn_implicit_tls_server(pki.acceptor.clone()).await;
    let transport = create_trusting_transport(port, SmtpEncryption::ImplicitTls, &pki.ca_pem);

    let result = transport.send(&test_message()).await;

    match result {
        Err(DeliveryError::AuthenticationFailed(msg)) => assert!(msg.contains("535")),
        other => panic!("Expected AuthenticationFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rejected_credentials_starttls() {
    let pki = test_pki();
    let port = spawn_starttls_server(pki.acceptor.clone()).await;
    let transport = create_trusting_transport(port, SmtpEncryption::StartTls, &pki.ca_pem);

    let result = transport.send(&test_message()).await;

    match result {
        Err(DeliveryError::AuthenticationFailed(msg)) => assert!(msg.contains("535")),
        other => panic!("Expected AuthenticationFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_untrusted_certificate_is_rejected() {
    let pki = test_pki();
    let port = spawn_implicit_tls_server(pki.acceptor.clone()).await;
    // System roots only; the private CA is not trusted
    let transport = create_test_transport(port, SmtpEncryption::ImplicitTls);

    let result = transport.send(&test_message()).await;
    match result {
        Err(DeliveryError::AuthenticationFailed(msg)) => {
            panic!("credentials were sent to an untrusted server: {}", msg)
        }
        Err(_) => {}
        Ok(receipt) => panic!("message was sent to an untrusted server: {:?}", receipt),
    }
}
