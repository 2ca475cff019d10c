//! SMTP email provider implementation using lettre.
//!
//! Works against production relays (TLS + credentials) and local
//! MailHog/Mailpit servers (plain, no auth).

use super::EmailProvider;
use crate::error::{DeliveryError, NotificationError, NotificationResult};
use crate::models::{OutboundEmail, SentEmail};
use async_trait::async_trait;
use core_config::{ConfigError, FromEnv, env_flag, env_or_default, env_parse};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::sync::Arc;
use tracing::{debug, error, info};

/// SMTP configuration.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// SMTP server host.
    pub host: String,
    /// SMTP server port.
    pub port: u16,
    /// Sender email address.
    pub from_email: String,
    /// Sender name.
    pub from_name: String,
    /// SMTP username (optional for dev servers like Mailpit).
    pub username: Option<String>,
    /// SMTP password (optional for dev servers like Mailpit).
    pub password: Option<String>,
    /// Whether to use TLS (false for local dev servers).
    pub use_tls: bool,
}

impl SmtpConfig {
    pub fn new(host: impl Into<String>, port: u16, from_email: impl Into<String>, from_name: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            from_email: from_email.into(),
            from_name: from_name.into(),
            username: None,
            password: None,
            use_tls: false,
        }
    }

    /// Builder method to set TLS.
    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    /// Builder method to set credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

impl FromEnv for SmtpConfig {
    /// Defaults target a local Mailpit on port 1025.
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env_or_default("SMTP_HOST", "localhost"),
            port: env_parse("SMTP_PORT", 1025)?,
            from_email: env_or_default("SMTP_FROM_EMAIL", "noreply@localhost"),
            from_name: env_or_default("SMTP_FROM_NAME", "Task Notifications"),
            username: std::env::var("SMTP_USERNAME").ok().filter(|v| !v.is_empty()),
            password: std::env::var("SMTP_PASSWORD").ok().filter(|v| !v.is_empty()),
            use_tls: env_flag("SMTP_USE_TLS", false)?,
        })
    }
}

/// SMTP email provider.
pub struct SmtpProvider {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: Arc<SmtpConfig>,
}

impl SmtpProvider {
    /// Create a new SMTP provider.
    pub fn new(config: SmtpConfig) -> NotificationResult<Self> {
        let transport = Self::build_transport(&config)?;
        Ok(Self {
            transport,
            config: Arc::new(config),
        })
    }

    /// Build the SMTP transport based on configuration.
    fn build_transport(config: &SmtpConfig) -> NotificationResult<AsyncSmtpTransport<Tokio1Executor>> {
        let credentials = match (&config.username, &config.password) {
            (Some(username), Some(password)) => Some(Credentials::new(username.clone(), password.clone())),
            _ => None,
        };

        let transport = if config.use_tls {
            let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| NotificationError::ProviderError(format!("Failed to create SMTP relay: {}", e)))?
                .port(config.port);
            if let Some(credentials) = credentials {
                builder = builder.credentials(credentials);
            }
            builder.build()
        } else {
            let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                .port(config.port);
            if let Some(credentials) = credentials {
                builder = builder.credentials(credentials);
            }
            builder.build()
        };

        Ok(transport)
    }

    /// Build a lettre Message. Address and build errors concern this recipient only.
    fn build_message(&self, email: &OutboundEmail) -> Result<Message, DeliveryError> {
        let from: Mailbox = format!("{} <{}>", self.config.from_name, self.config.from_email)
            .parse()
            .map_err(|e| DeliveryError::unavailable(format!("Invalid from address: {}", e)))?;

        let to: Mailbox = if email.to_name.is_empty() {
            email.to_email.parse()
        } else {
            format!("{} <{}>", email.to_name, email.to_email).parse()
        }
        .map_err(|e| DeliveryError::recipient(&email.to_email, format!("Invalid to address: {}", e)))?;

        let content_type = if email.is_html {
            ContentType::TEXT_HTML
        } else {
            ContentType::TEXT_PLAIN
        };

        Message::builder()
            .from(from)
            .to(to)
            .subject(&email.subject)
            .header(content_type)
            .body(email.body.clone())
            .map_err(|e| DeliveryError::recipient(&email.to_email, format!("Failed to build email message: {}", e)))
    }
}

/// Only mailbox-level rejections (550-553) concern this recipient. Auth
/// failures (530/534/535/538), 4xx replies and connection errors mean the
/// transport is not usable right now.
fn classify_reply(to: &str, code: Option<u16>, details: String) -> DeliveryError {
    match code {
        Some(550..=553) => DeliveryError::recipient(to, details),
        _ => DeliveryError::unavailable(format!("SMTP send failed: {}", details)),
    }
}

fn classify_send_error(to: &str, err: &lettre::transport::smtp::Error) -> DeliveryError {
    classify_reply(to, err.status().map(u16::from), err.to_string())
}

#[async_trait]
impl EmailProvider for SmtpProvider {
    async fn send(&self, email: &OutboundEmail) -> Result<SentEmail, DeliveryError> {
        debug!(
            to = %email.to_email,
            subject = %email.subject,
            host = %self.config.host,
            port = %self.config.port,
            is_html = email.is_html,
            "Sending email via SMTP"
        );

        let message = self.build_message(email)?;

        let response = self.transport.send(message).await.map_err(|e| {
            error!(to = %email.to_email, error = %e, "Failed to send email via SMTP");
            classify_send_error(&email.to_email, &e)
        })?;

        let message_id = response.message().next().map(|s| s.to_string());

        info!(
            to = %email.to_email,
            message_id = ?message_id,
            "Email sent successfully via SMTP"
        );

        Ok(SentEmail {
            message_id,
            accepted: response.is_positive(),
        })
    }

    fn name(&self) -> &'static str {
        "SMTP"
    }

    async fn health_check(&self) -> Result<bool, DeliveryError> {
        self.transport
            .test_connection()
            .await
            .map_err(|e| DeliveryError::unavailable(format!("SMTP health check failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    fn provider() -> SmtpProvider {
        SmtpProvider::new(SmtpConfig::new("localhost", 1025, "noreply@example.test", "Tasks")).unwrap()
    }

    #[test]
    fn test_smtp_config_from_env_defaults() {
        temp_env::with_vars_unset(
            ["SMTP_HOST", "SMTP_PORT", "SMTP_USE_TLS", "SMTP_USERNAME", "SMTP_PASSWORD"],
            || {
                let config = SmtpConfig::from_env().unwrap();
                assert_eq!(config.host, "localhost");
                assert_eq!(config.port, 1025);
                assert!(!config.use_tls);
                assert_eq!(config.username, None);
            },
        );
    }

    #[test]
    fn test_smtp_config_from_env_overrides() {
        temp_env::with_vars(
            [
                ("SMTP_HOST", Some("smtp.example.test")),
                ("SMTP_PORT", Some("587")),
                ("SMTP_USE_TLS", Some("true")),
                ("SMTP_USERNAME", Some("mailer")),
                ("SMTP_PASSWORD", Some("secret")),
            ],
            || {
                let config = SmtpConfig::from_env().unwrap();
                assert_eq!(config.host, "smtp.example.test");
                assert_eq!(config.port, 587);
                assert!(config.use_tls);
                assert_eq!(config.username.as_deref(), Some("mailer"));
            },
        );
    }

    #[test]
    fn test_smtp_config_rejects_bad_port() {
        temp_env::with_var("SMTP_PORT", Some("not-a-port"), || {
            assert!(SmtpConfig::from_env().is_err());
        });
    }

    #[test]
    fn test_smtp_config_with_tls() {
        let config = SmtpConfig::new("smtp.example.test", 587, "a@example.test", "Test")
            .with_tls(true)
            .with_credentials("user", "pass");

        assert!(config.use_tls);
        assert_eq!(config.username, Some("user".to_string()));
        assert_eq!(config.password, Some("pass".to_string()));
    }

    #[tokio::test]
    async fn test_invalid_recipient_address_is_per_recipient() {
        let err = provider()
            .build_message(&OutboundEmail {
                to_email: "not an address".to_string(),
                subject: "Hi".to_string(),
                body: "Body".to_string(),
                ..OutboundEmail::default()
            })
            .unwrap_err();
        assert!(!err.is_sink_wide());
    }

    #[tokio::test]
    async fn test_build_message_sets_content_type() {
        let message = provider()
            .build_message(&OutboundEmail {
                to_email: "lin@example.test".to_string(),
                to_name: "Lin".to_string(),
                subject: "Deadline".to_string(),
                body: "<p>Due</p>".to_string(),
                is_html: true,
            })
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Content-Type: text/html"));
        assert!(raw.contains("Subject: Deadline"));
    }

    #[test]
    fn test_classify_reply_codes() {
        for code in [550, 551, 552, 553] {
            assert!(!classify_reply("a@example.test", Some(code), String::new()).is_sink_wide());
        }
        for code in [421, 450, 451, 530, 534, 535, 538, 554] {
            assert!(
                classify_reply("a@example.test", Some(code), String::new()).is_sink_wide(),
                "{} should be sink-wide",
                code
            );
        }
        assert!(classify_reply("a@example.test", None, "connection refused".to_string()).is_sink_wide());
    }

    /// Plain-text SMTP server on localhost; `reply` overrides the default
    /// `250 ok` answer per command.
    async fn scripted_server(reply: fn(&str) -> Option<&'static str>) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            let mut lines = BufReader::new(read).lines();
            write.write_all(b"220 mail.example.test ESMTP\r\n").await.unwrap();

            while let Ok(Some(line)) = lines.next_line().await {
                let command = line.to_ascii_uppercase();
                let answer = if command.starts_with("EHLO") {
                    "250-mail.example.test\r\n250 AUTH PLAIN LOGIN\r\n"
                } else if command.starts_with("QUIT") {
                    let _ = write.write_all(b"221 bye\r\n").await;
                    break;
                } else {
                    reply(&command).unwrap_or("250 ok\r\n")
                };
                if write.write_all(answer.as_bytes()).await.is_err() {
                    break;
                }
            }
        });

        port
    }

    fn outbound(to: &str) -> OutboundEmail {
        OutboundEmail {
            to_email: to.to_string(),
            subject: "Deadline".to_string(),
            body: "Due tomorrow".to_string(),
            ..OutboundEmail::default()
        }
    }

    #[tokio::test]
    async fn test_rejected_credentials_are_sink_wide() {
        let port = scripted_server(|command| {
            command
                .starts_with("AUTH")
                .then_some("535 5.7.8 Authentication credentials invalid\r\n")
        })
        .await;
        let provider = SmtpProvider::new(
            SmtpConfig::new("127.0.0.1", port, "noreply@example.test", "Tasks")
                .with_credentials("mailer", "wrong"),
        )
        .unwrap();

        let err = provider.send(&outbound("a@example.test")).await.unwrap_err();
        assert!(err.is_sink_wide(), "{:?}", err);
    }

    #[tokio::test]
    async fn test_unknown_mailbox_is_per_recipient() {
        let port = scripted_server(|command| {
            command
                .starts_with("RCPT")
                .then_some("550 5.1.1 No such mailbox\r\n")
        })
        .await;
        let provider =
            SmtpProvider::new(SmtpConfig::new("127.0.0.1", port, "noreply@example.test", "Tasks"))
                .unwrap();

        let err = provider.send(&outbound("gone@example.test")).await.unwrap_err();
        assert!(
            matches!(err, DeliveryError::Recipient { ref recipient, .. } if recipient == "gone@example.test"),
            "{:?}",
            err
        );
    }
}
