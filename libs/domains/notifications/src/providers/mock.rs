//! Mock email provider for testing

use super::EmailProvider;
use crate::error::DeliveryError;
use crate::models::{OutboundEmail, SentEmail};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Mock email provider that captures sent emails
#[derive(Clone, Default)]
pub struct MockEmailProvider {
    sent_emails: Arc<Mutex<Vec<OutboundEmail>>>,
    failures: Arc<Mutex<VecDeque<DeliveryError>>>,
    rejected: Arc<Mutex<HashSet<String>>>,
    attempts: Arc<AtomicUsize>,
}

impl MockEmailProvider {
    /// Create a new mock provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next send with `error`
    pub async fn fail_next(&self, error: DeliveryError) {
        self.failures.lock().await.push_back(error);
    }

    /// Always reject mail to `address` as a per-recipient failure
    pub async fn reject_address(&self, address: impl Into<String>) {
        self.rejected.lock().await.insert(address.into());
    }

    /// Get all sent emails
    pub async fn sent_emails(&self) -> Vec<OutboundEmail> {
        self.sent_emails.lock().await.clone()
    }

    /// Get the count of sent emails
    pub async fn sent_count(&self) -> usize {
        self.sent_emails.lock().await.len()
    }

    /// Check if an email was sent to a specific address
    pub async fn was_sent_to(&self, email: &str) -> bool {
        self.sent_emails
            .lock()
            .await
            .iter()
            .any(|e| e.to_email == email)
    }

    /// Sends attempted, successful or not
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmailProvider for MockEmailProvider {
    async fn send(&self, email: &OutboundEmail) -> Result<SentEmail, DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.failures.lock().await.pop_front() {
            return Err(error);
        }
        if self.rejected.lock().await.contains(&email.to_email) {
            return Err(DeliveryError::recipient(&email.to_email, "550 mailbox unavailable"));
        }

        self.sent_emails.lock().await.push(email.clone());

        Ok(SentEmail {
            message_id: Some(format!("mock-{}", self.attempts())),
            accepted: true,
        })
    }

    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn health_check(&self) -> Result<bool, DeliveryError> {
        Ok(true)
    }
}
