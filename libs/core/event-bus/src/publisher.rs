//! Bounded, non-blocking event publishing.
//!
//! `EventBus::publish` serializes the event and hands it to a bounded queue
//! drained by a background dispatcher. The caller never waits on the broker:
//! a full queue or a closed bus is reported back immediately and the business
//! operation carries on. Publish failures inside the dispatcher are logged and
//! counted, never surfaced.

use crate::broker::Broker;
use crate::config::BusConfig;
use crate::error::{BusError, BusResult};
use crate::metrics::BusMetrics;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

#[derive(Debug)]
struct OutboundMessage {
    routing_key: String,
    payload: Vec<u8>,
}

/// Shared, cloneable publishing handle.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: mpsc::Sender<OutboundMessage>,
    capacity: usize,
    metrics: BusMetrics,
}

impl EventBus {
    /// Spawn the dispatcher and return the handle plus the dispatcher task.
    ///
    /// The dispatcher exits once every `EventBus` clone is dropped and the
    /// queue has drained.
    pub fn start(
        broker: Arc<dyn Broker>,
        exchange: impl Into<String>,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let exchange = exchange.into();
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let metrics = BusMetrics::new(exchange.clone());

        let dispatcher = tokio::spawn(dispatch(broker, exchange, rx, metrics.clone()));

        (
            Self {
                tx,
                capacity,
                metrics,
            },
            dispatcher,
        )
    }

    pub fn from_config(broker: Arc<dyn Broker>, config: &BusConfig) -> (Self, JoinHandle<()>) {
        Self::start(broker, config.exchange.clone(), config.publish_buffer)
    }

    /// A bus with no broker behind it; every publish fails with `Closed`.
    pub fn disabled() -> Self {
        let (tx, _rx) = mpsc::channel(1);
        Self {
            tx,
            capacity: 1,
            metrics: BusMetrics::new("disabled"),
        }
    }

    /// Queue an event for publishing without waiting.
    pub fn publish<T: Serialize>(&self, routing_key: &str, event: &T) -> BusResult<()> {
        let payload = serde_json::to_vec(event).inspect_err(|_| {
            self.metrics.event_dropped("serialization");
        })?;

        let message = OutboundMessage {
            routing_key: routing_key.to_string(),
            payload,
        };

        match self.tx.try_send(message) {
            Ok(()) => {
                self.metrics.event_queued(routing_key);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.metrics.event_dropped("queue_full");
                Err(BusError::QueueFull {
                    capacity: self.capacity,
                })
            }
            Err(TrySendError::Closed(_)) => {
                self.metrics.event_dropped("closed");
                Err(BusError::Closed)
            }
        }
    }

    /// Queue an event, waiting for capacity when the queue is full.
    pub async fn publish_with_backpressure<T: Serialize>(
        &self,
        routing_key: &str,
        event: &T,
    ) -> BusResult<()> {
        let payload = serde_json::to_vec(event)?;
        self.tx
            .send(OutboundMessage {
                routing_key: routing_key.to_string(),
                payload,
            })
            .await
            .map_err(|_| {
                self.metrics.event_dropped("closed");
                BusError::Closed
            })?;
        self.metrics.event_queued(routing_key);
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

async fn dispatch(
    broker: Arc<dyn Broker>,
    exchange: String,
    mut rx: mpsc::Receiver<OutboundMessage>,
    metrics: BusMetrics,
) {
    info!(exchange = %exchange, broker = broker.name(), "Event dispatcher started");

    while let Some(message) = rx.recv().await {
        match broker
            .publish(&exchange, &message.routing_key, &message.payload)
            .await
        {
            Ok(()) => {
                debug!(routing_key = %message.routing_key, "Event published");
                metrics.event_published(&message.routing_key);
            }
            Err(e) => {
                error!(
                    routing_key = %message.routing_key,
                    error = %e,
                    "Failed to publish event"
                );
                metrics.publish_failed(&message.routing_key);
            }
        }
    }

    info!(exchange = %exchange, "Event dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{DeliveryStream, QueueSpec};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Semaphore;

    /// Broker whose publishes wait for a permit, so the dispatcher can be
    /// held on its first message.
    struct GatedBroker {
        gate: Semaphore,
        entered: AtomicUsize,
        published: AtomicUsize,
    }

    impl GatedBroker {
        fn closed() -> Self {
            Self {
                gate: Semaphore::new(0),
                entered: AtomicUsize::new(0),
                published: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Broker for GatedBroker {
        async fn declare_exchange(&self, _exchange: &str) -> BusResult<()> {
            Ok(())
        }

        async fn declare_queue(&self, _spec: &QueueSpec) -> BusResult<()> {
            Ok(())
        }

        async fn publish(&self, _: &str, _: &str, _: &[u8]) -> BusResult<()> {
            self.entered.fetch_add(1, Ordering::SeqCst);
            self.gate.acquire().await.map_err(|_| BusError::Closed)?.forget();
            self.published.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn consume(&self, _: &str, _: &str) -> BusResult<DeliveryStream> {
            Err(BusError::Closed)
        }

        fn name(&self) -> &'static str {
            "gated"
        }
    }

    /// Capacity-1 bus whose dispatcher is parked inside the first publish.
    async fn held_bus() -> (EventBus, Arc<GatedBroker>) {
        let broker = Arc::new(GatedBroker::closed());
        let (bus, _dispatcher) = EventBus::start(broker.clone(), "events", 1);
        bus.publish("email.a", &json!({})).unwrap();
        while broker.entered.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        (bus, broker)
    }

    async fn wait_for(counter: &AtomicUsize, expected: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while counter.load(Ordering::SeqCst) < expected {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("counter never reached the expected value");
    }

    #[tokio::test]
    async fn test_disabled_bus_reports_closed() {
        let bus = EventBus::disabled();
        let result = bus.publish("email.task.completed", &json!({"eventType": "task.completed"}));
        assert!(matches!(result, Err(BusError::Closed)));
        assert!(bus.is_closed());
    }

    #[tokio::test]
    async fn test_full_queue_fails_fast() {
        let (bus, broker) = held_bus().await;

        // The dispatcher holds the first message; the second fills the queue.
        bus.publish("email.b", &json!({})).unwrap();
        let result = bus.publish("email.c", &json!({}));
        assert!(matches!(result, Err(BusError::QueueFull { capacity: 1 })), "{:?}", result);

        broker.gate.add_permits(10);
        wait_for(&broker.published, 2).await;
        tokio::task::yield_now().await;
        assert_eq!(broker.published.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_backpressure_waits_for_capacity() {
        let (bus, broker) = held_bus().await;
        bus.publish("email.b", &json!({})).unwrap();

        let waiting = {
            let bus = bus.clone();
            tokio::spawn(async move { bus.publish_with_backpressure("email.c", &json!({})).await })
        };
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!waiting.is_finished());

        broker.gate.add_permits(10);
        let result = tokio::time::timeout(Duration::from_secs(2), waiting)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        wait_for(&broker.published, 3).await;
    }

    #[tokio::test]
    async fn test_backpressure_on_closed_bus_fails() {
        let result = EventBus::disabled()
            .publish_with_backpressure("email.a", &json!({}))
            .await;
        assert!(matches!(result, Err(BusError::Closed)));
    }

    #[tokio::test]
    async fn test_dispatcher_stops_when_handles_dropped() {
        let broker = Arc::new(crate::memory::InMemoryBroker::new());
        broker.declare_exchange("events").await.unwrap();
        let (bus, dispatcher) = EventBus::start(broker, "events", 8);
        bus.publish("email.task.created", &json!({})).unwrap();
        drop(bus);
        dispatcher.await.unwrap();
    }
}
