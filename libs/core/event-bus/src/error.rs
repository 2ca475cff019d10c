//! Bus error types and handler error categorization
//!
//! Handler errors are categorized to decide what happens to the message:
//! - **Transient**: infrastructure hiccup, requeue for redelivery (bounded)
//! - **Permanent**: cannot succeed on retry, dead-letter immediately

use thiserror::Error;

/// Category of a handler failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Temporary failure - requeue the whole message
    Transient,
    /// Unrecoverable failure - dead-letter without requeue
    Permanent,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Transient => "transient",
            ErrorCategory::Permanent => "permanent",
        }
    }
}

/// Broker, publishing and topology errors
#[derive(Error, Debug)]
pub enum BusError {
    /// AMQP connection, channel or protocol error
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    /// Event could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Outbound queue is at capacity
    #[error("Outbound queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// Bus or delivery stream is closed
    #[error("Event bus is closed")]
    Closed,

    /// Exchange/queue declaration or routing problem
    #[error("Topology error: {0}")]
    Topology(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type BusResult<T> = Result<T, BusError>;

impl From<serde_json::Error> for BusError {
    fn from(err: serde_json::Error) -> Self {
        BusError::Serialization(err.to_string())
    }
}

impl From<core_config::ConfigError> for BusError {
    fn from(err: core_config::ConfigError) -> Self {
        BusError::Config(err.to_string())
    }
}

/// Error returned by an [`EventHandler`](crate::EventHandler).
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ProcessingError {
    message: String,
    category: ErrorCategory,
}

impl ProcessingError {
    /// Create a transient processing error
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            category: ErrorCategory::Transient,
        }
    }

    /// Create a permanent processing error
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            category: ErrorCategory::Permanent,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_transient(&self) -> bool {
        self.category == ErrorCategory::Transient
    }

    /// Whether a message that failed on `attempt` (1-based) should go back on the queue.
    ///
    /// `max_redeliveries` bounds the number of requeues; the attempt after the
    /// last allowed redelivery is dead-lettered instead.
    pub fn should_requeue(&self, attempt: u32, max_redeliveries: u32) -> bool {
        self.is_transient() && attempt <= max_redeliveries
    }
}
