//! Notifications Domain
//!
//! Turns domain events into in-app notifications and emails.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ Domain service  │  ← EmailPublisher / NotificationPublisher
//! └────────┬────────┘
//!          │ email.<event> / notification.<event>
//! ┌────────▼────────┐
//! │ Topic exchange  │  ← event_bus
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │   Processors    │  ← recipients → content → delivery
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │ Delivery sinks  │  ← notifications table, SMTP
//! └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_notifications::{
//!     EmailEvent, EmailPublisher, EventType, NotificationEvent, NotificationPublisher,
//! };
//!
//! let publisher = NotificationPublisher::new(bus.clone());
//! publisher.publish(NotificationEvent::new(EventType::TaskCreated).with_task(&task.id));
//!
//! EmailPublisher::new(bus).publish(EmailEvent::new(EventType::DeadlineReminder).with_node(&node.id));
//! ```

pub mod channels;
pub mod content;
pub mod context;
pub mod entity;
pub mod error;
pub mod events;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod processor;
pub mod providers;
pub mod publisher;
pub mod registry;
pub mod repository;
pub mod resolver;
pub mod templates;

pub use channels::{Channel, EmailChannel, NotificationChannel};
pub use content::{ContentGenerator, ExplicitContent, GeneratedContent, NoContentReason};
pub use context::PipelineContext;
pub use error::{DeliveryError, NotificationError, NotificationResult, TemplateError};
pub use events::{Correlation, EmailEvent, EventType, NotificationEvent};
pub use memory::{InMemoryEntityStore, InMemoryNotificationSink};
pub use models::{
    Department, DeliveryReport, Employee, Handover, NewNotification, Notification, OutboundEmail,
    SentEmail, Task, TaskNode,
};
pub use postgres::{PgEntityStore, PgNotificationSink};
pub use processor::{EmailProcessor, NotificationProcessor};
pub use providers::{EmailProvider, LogEmailProvider, MockEmailProvider, SmtpConfig, SmtpProvider};
pub use publisher::{EmailPublisher, NotificationPublisher};
pub use registry::{EventRegistry, EventRules, RecipientRule};
pub use repository::{EntityStore, NotificationSink};
pub use resolver::RecipientResolver;
pub use templates::{RenderedMessage, TemplateEngine};
