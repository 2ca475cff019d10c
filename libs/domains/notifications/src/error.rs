//! Error types for the notifications domain.

use thiserror::Error;

/// Result type for notification operations.
pub type NotificationResult<T> = Result<T, NotificationError>;

/// Errors raised while resolving recipients or wiring the pipeline.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// Entity store failure.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Template registration or rendering error.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Event registry is incomplete or inconsistent.
    #[error("Event registry error: {0}")]
    Registry(String),

    /// Email provider could not be built.
    #[error("Email provider error: {0}")]
    ProviderError(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<sea_orm::DbErr> for NotificationError {
    fn from(err: sea_orm::DbErr) -> Self {
        NotificationError::DatabaseError(err.to_string())
    }
}

impl From<core_config::ConfigError> for NotificationError {
    fn from(err: core_config::ConfigError) -> Self {
        NotificationError::ConfigError(err.to_string())
    }
}

/// Outcome of a failed sink call.
///
/// `Recipient` failures are scoped to one recipient and the processor moves on.
/// `Unavailable` means the sink as a whole is down and the message must be
/// redelivered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("Delivery to {recipient} failed: {reason}")]
    Recipient { recipient: String, reason: String },

    #[error("Delivery sink unavailable: {0}")]
    Unavailable(String),
}

impl DeliveryError {
    pub fn recipient(recipient: impl Into<String>, reason: impl Into<String>) -> Self {
        DeliveryError::Recipient {
            recipient: recipient.into(),
            reason: reason.into(),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        DeliveryError::Unavailable(reason.into())
    }

    /// True when the whole sink is failing, not just one recipient.
    pub fn is_sink_wide(&self) -> bool {
        matches!(self, DeliveryError::Unavailable(_))
    }
}

/// Template registry errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Failed to register template {name}: {details}")]
    Register { name: String, details: String },

    #[error("Failed to render template {name}: {details}")]
    Render { name: String, details: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_error_scope() {
        assert!(DeliveryError::unavailable("connection refused").is_sink_wide());
        assert!(!DeliveryError::recipient("emp-1", "no email").is_sink_wide());
    }

    #[test]
    fn test_delivery_error_display() {
        let err = DeliveryError::recipient("a@example.test", "mailbox unavailable");
        assert_eq!(
            err.to_string(),
            "Delivery to a@example.test failed: mailbox unavailable"
        );
    }

    #[test]
    fn test_db_err_conversion() {
        let err: NotificationError = sea_orm::DbErr::Custom("boom".to_string()).into();
        assert!(matches!(err, NotificationError::DatabaseError(msg) if msg.contains("boom")));
    }
}
