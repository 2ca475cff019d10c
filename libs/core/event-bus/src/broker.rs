//! Broker abstraction shared by the AMQP and in-memory backends.

use crate::error::BusResult;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;

/// Declaration of a durable queue bound to the topic exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    pub exchange: String,
    pub queue: String,
    pub binding_pattern: String,
    /// Where rejected and retry-exhausted messages are parked
    pub dead_letter_queue: Option<String>,
    /// Broker-side cap on redeliveries, where the backend supports one
    pub delivery_limit: Option<u32>,
}

/// Settles a single delivery with the broker.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self) -> BusResult<()>;

    async fn nack(&self, requeue: bool) -> BusResult<()>;
}

/// A message handed to a consumer, settled exactly once via `ack` or `nack`.
pub struct Delivery {
    pub routing_key: String,
    pub body: Vec<u8>,
    pub redelivered: bool,
    /// 1 on first delivery, incremented on every requeue
    pub attempt: u32,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(
        routing_key: impl Into<String>,
        body: Vec<u8>,
        redelivered: bool,
        attempt: u32,
        acker: impl Acknowledger + 'static,
    ) -> Self {
        Self {
            routing_key: routing_key.into(),
            body,
            redelivered,
            attempt: attempt.max(1),
            acker: Box::new(acker),
        }
    }

    pub async fn ack(self) -> BusResult<()> {
        self.acker.ack().await
    }

    pub async fn nack(self, requeue: bool) -> BusResult<()> {
        self.acker.nack(requeue).await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("routing_key", &self.routing_key)
            .field("body_len", &self.body.len())
            .field("redelivered", &self.redelivered)
            .field("attempt", &self.attempt)
            .finish()
    }
}

pub type DeliveryStream = BoxStream<'static, BusResult<Delivery>>;

/// Message broker operations used by publishers and consumers.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Declare the durable, non-auto-delete topic exchange.
    async fn declare_exchange(&self, exchange: &str) -> BusResult<()>;

    /// Declare a durable queue (and its dead-letter queue) and bind it.
    async fn declare_queue(&self, spec: &QueueSpec) -> BusResult<()>;

    /// Publish a persistent JSON payload.
    async fn publish(&self, exchange: &str, routing_key: &str, payload: &[u8]) -> BusResult<()>;

    /// Start consuming a queue with manual acknowledgment.
    async fn consume(&self, queue: &str, consumer_tag: &str) -> BusResult<DeliveryStream>;

    async fn health_check(&self) -> BusResult<()> {
        Ok(())
    }

    /// Release the connection once consumers have stopped.
    async fn close(&self) -> BusResult<()> {
        Ok(())
    }

    fn name(&self) -> &'static str;
}
