//! Channel consumer: the sequential receive loop with manual settlement.
//!
//! Per message:
//! - body does not decode → `nack(requeue = false)` (poison, never redelivered)
//! - handler succeeds → `ack`
//! - handler fails transiently → `nack(requeue = true)` while the retry budget
//!   lasts, then `nack(requeue = false)` so the message lands on the
//!   dead-letter queue
//! - handler fails permanently → `nack(requeue = false)`

use crate::broker::{Broker, Delivery};
use crate::config::ConsumerConfig;
use crate::error::{BusError, BusResult, ErrorCategory, ProcessingError};
use crate::metrics::ConsumerMetrics;
use async_trait::async_trait;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Domain handler for one decoded event type.
///
/// # Example
///
/// ```rust,ignore
/// use event_bus::{EventHandler, ProcessingError};
///
/// struct AuditHandler;
///
/// #[async_trait]
/// impl EventHandler<AuditEvent> for AuditHandler {
///     async fn handle(&self, event: &AuditEvent) -> Result<(), ProcessingError> {
///         write_audit_row(event).await.map_err(|e| ProcessingError::transient(e.to_string()))
///     }
///
///     fn name(&self) -> &'static str {
///         "AuditHandler"
///     }
/// }
/// ```
#[async_trait]
pub trait EventHandler<E>: Send + Sync {
    /// Handle one event. `Ok` acknowledges the message.
    async fn handle(&self, event: &E) -> Result<(), ProcessingError>;

    /// Handler name for logs and metric labels.
    fn name(&self) -> &'static str;
}

/// How a delivery was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Acked,
    Requeued,
    /// Undecodable body
    Rejected,
    /// Permanent failure or retry budget exhausted
    DeadLettered,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Acked => "acked",
            Disposition::Requeued => "requeued",
            Disposition::Rejected => "rejected",
            Disposition::DeadLettered => "dead_lettered",
        }
    }
}

/// Runs one channel's queue through an [`EventHandler`], one message at a time.
pub struct ChannelConsumer<E, H> {
    broker: Arc<dyn Broker>,
    handler: Arc<H>,
    config: ConsumerConfig,
    metrics: ConsumerMetrics,
    _event: PhantomData<fn() -> E>,
}

impl<E, H> ChannelConsumer<E, H>
where
    E: DeserializeOwned + Send + Sync + 'static,
    H: EventHandler<E> + 'static,
{
    pub fn new(broker: Arc<dyn Broker>, handler: H, config: ConsumerConfig) -> Self {
        Self::with_arc_handler(broker, Arc::new(handler), config)
    }

    pub fn with_arc_handler(broker: Arc<dyn Broker>, handler: Arc<H>, config: ConsumerConfig) -> Self {
        let metrics = ConsumerMetrics::new(config.queue.clone(), handler.name());
        Self {
            broker,
            handler,
            config,
            metrics,
            _event: PhantomData,
        }
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Declare the exchange, this channel's queue, its binding and dead-letter queue.
    pub async fn declare(&self) -> BusResult<()> {
        self.broker.declare_exchange(&self.config.exchange).await?;
        self.broker.declare_queue(&self.config.queue_spec()).await
    }

    /// Run the receive loop until `shutdown` flips to `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> BusResult<()> {
        self.declare().await?;

        let mut deliveries = self
            .broker
            .consume(&self.config.queue, &self.config.consumer_tag)
            .await?;

        info!(
            queue = %self.config.queue,
            pattern = %self.config.binding_pattern,
            handler = %self.handler.name(),
            max_redeliveries = self.config.max_redeliveries,
            "Channel consumer started"
        );

        loop {
            if *shutdown.borrow() {
                info!(queue = %self.config.queue, "Received shutdown signal, stopping consumer");
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(queue = %self.config.queue, "Received shutdown signal, stopping consumer");
                        break;
                    }
                }
                next = deliveries.next() => match next {
                    Some(Ok(delivery)) => {
                        self.handle_delivery(delivery).await;
                    }
                    Some(Err(e)) => {
                        error!(queue = %self.config.queue, error = %e, "Error receiving delivery");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                    None => {
                        warn!(queue = %self.config.queue, "Delivery stream closed");
                        return Err(BusError::Closed);
                    }
                }
            }
        }

        info!(queue = %self.config.queue, "Channel consumer stopped");
        Ok(())
    }

    /// Decode, handle and settle a single delivery.
    pub async fn handle_delivery(&self, delivery: Delivery) -> Disposition {
        let started = Instant::now();
        let attempt = delivery.attempt;
        let routing_key = delivery.routing_key.clone();
        self.metrics.message_received();

        let event: E = match serde_json::from_slice(&delivery.body) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    routing_key = %routing_key,
                    error = %e,
                    "Rejecting malformed message without requeue"
                );
                return self.settle(delivery, Disposition::Rejected, started).await;
            }
        };

        debug!(routing_key = %routing_key, attempt, "Handling event");

        let disposition = match self.handler.handle(&event).await {
            Ok(()) => Disposition::Acked,
            Err(e) if e.should_requeue(attempt, self.config.max_redeliveries) => {
                warn!(
                    routing_key = %routing_key,
                    attempt,
                    error = %e,
                    "Transient failure, requeueing message"
                );
                Disposition::Requeued
            }
            Err(e) if e.category() == ErrorCategory::Transient => {
                error!(
                    routing_key = %routing_key,
                    attempt,
                    max_redeliveries = self.config.max_redeliveries,
                    error = %e,
                    "Retry budget exhausted, dead-lettering message"
                );
                Disposition::DeadLettered
            }
            Err(e) => {
                error!(
                    routing_key = %routing_key,
                    error = %e,
                    "Permanent failure, dead-lettering message"
                );
                Disposition::DeadLettered
            }
        };

        self.settle(delivery, disposition, started).await
    }

    async fn settle(&self, delivery: Delivery, disposition: Disposition, started: Instant) -> Disposition {
        let routing_key = delivery.routing_key.clone();
        let result = match disposition {
            Disposition::Acked => delivery.ack().await,
            Disposition::Requeued => delivery.nack(true).await,
            Disposition::Rejected | Disposition::DeadLettered => delivery.nack(false).await,
        };

        if let Err(e) = result {
            // The broker redelivers unsettled messages when the channel closes.
            error!(routing_key = %routing_key, error = %e, "Failed to settle delivery");
            self.metrics.settle_failed();
        }

        self.metrics.message_settled(disposition, started.elapsed());
        disposition
    }
}
