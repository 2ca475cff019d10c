//! Provider that logs emails instead of sending them. For local runs.

use super::EmailProvider;
use crate::error::DeliveryError;
use crate::models::{OutboundEmail, SentEmail};
use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct LogEmailProvider;

impl LogEmailProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmailProvider for LogEmailProvider {
    async fn send(&self, email: &OutboundEmail) -> Result<SentEmail, DeliveryError> {
        let message_id = Uuid::now_v7().to_string();
        info!(
            to = %email.to_email,
            subject = %email.subject,
            is_html = email.is_html,
            body_len = email.body.len(),
            message_id = %message_id,
            "Email logged (not sent)"
        );
        Ok(SentEmail {
            message_id: Some(message_id),
            accepted: true,
        })
    }

    fn name(&self) -> &'static str {
        "Log"
    }

    async fn health_check(&self) -> Result<bool, DeliveryError> {
        Ok(true)
    }
}
