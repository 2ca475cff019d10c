//! Email provider implementations.
//!
//! This module contains the `EmailProvider` trait and implementations
//! for the outbound email transports.

mod logging;
mod mock;
mod smtp;

pub use logging::LogEmailProvider;
pub use mock::MockEmailProvider;
pub use smtp::{SmtpConfig, SmtpProvider};

use crate::error::DeliveryError;
use crate::models::{OutboundEmail, SentEmail};
use async_trait::async_trait;

/// Trait for email sending providers.
///
/// `send` reports a per-recipient problem (bad address, mailbox rejected)
/// as `DeliveryError::Recipient` and a transport-wide problem (connection
/// refused, auth failure, 4xx) as `DeliveryError::Unavailable`.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Send an email.
    async fn send(&self, email: &OutboundEmail) -> Result<SentEmail, DeliveryError>;

    /// Get the provider name for logging.
    fn name(&self) -> &'static str;

    /// Check if the provider is healthy/configured.
    async fn health_check(&self) -> Result<bool, DeliveryError>;
}
