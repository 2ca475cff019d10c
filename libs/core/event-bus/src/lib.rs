//! Event Bus
//!
//! Durable, at-least-once fan-out of JSON events over a topic exchange.
//!
//! ## Features
//!
//! - **Broker abstraction**: `AmqpBroker` (RabbitMQ via lapin) and `InMemoryBroker`
//! - **Non-blocking publishing**: `EventBus` hands events to a bounded queue
//! - **Channel consumers**: `ChannelConsumer<E, H>` runs a sequential loop with
//!   manual ack/nack, bounded requeues and a dead-letter queue
//! - **Prometheus metrics**
//!
//! ## Example
//!
//! ```ignore
//! use event_bus::{BusConfig, ChannelConsumer, ChannelDef, ConsumerConfig, EventBus};
//!
//! struct EmailChannel;
//! impl ChannelDef for EmailChannel {
//!     const CHANNEL: &'static str = "email";
//!     const QUEUE_NAME: &'static str = "email.events";
//!     const DEAD_LETTER_QUEUE: &'static str = "email.events.dlq";
//! }
//!
//! let (bus, _dispatcher) = EventBus::from_config(broker.clone(), &config);
//! bus.publish(&EmailChannel::routing_key("task.completed"), &event)?;
//!
//! let consumer = ChannelConsumer::new(broker, handler, ConsumerConfig::for_channel::<EmailChannel>(&config));
//! consumer.run(shutdown_rx).await?;
//! ```

mod amqp;
mod broker;
mod channel;
mod config;
mod consumer;
mod error;
mod memory;
pub mod metrics;
mod publisher;

pub use amqp::AmqpBroker;
pub use broker::{Acknowledger, Broker, Delivery, DeliveryStream, QueueSpec};
pub use channel::{topic_matches, ChannelDef};
pub use config::{BusConfig, ConsumerConfig};
pub use consumer::{ChannelConsumer, Disposition, EventHandler};
pub use error::{BusError, BusResult, ErrorCategory, ProcessingError};
pub use memory::{InMemoryBroker, QueueStats};
pub use metrics::{init_metrics, render_metrics, BusMetrics, ConsumerMetrics};
pub use publisher::EventBus;
