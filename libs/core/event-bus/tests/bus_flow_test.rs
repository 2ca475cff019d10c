//! End-to-end flow over the in-memory broker: EventBus → exchange → queue → ChannelConsumer.

use async_trait::async_trait;
use event_bus::{
    Broker, BusConfig, ChannelConsumer, ChannelDef, ConsumerConfig, Disposition, EventBus,
    EventHandler, InMemoryBroker, ProcessingError,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

struct MailChannel;

impl ChannelDef for MailChannel {
    const CHANNEL: &'static str = "email";
    const QUEUE_NAME: &'static str = "email.events";
    const DEAD_LETTER_QUEUE: &'static str = "email.events.dlq";
}

struct InboxChannel;

impl ChannelDef for InboxChannel {
    const CHANNEL: &'static str = "notification";
    const QUEUE_NAME: &'static str = "notification.events";
    const DEAD_LETTER_QUEUE: &'static str = "notification.events.dlq";
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    event_type: String,
}

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<String>>,
    fail_first: Mutex<bool>,
}

#[async_trait]
impl EventHandler<Envelope> for Recorder {
    async fn handle(&self, event: &Envelope) -> Result<(), ProcessingError> {
        let mut fail_first = self.fail_first.lock().await;
        self.seen.lock().await.push(event.event_type.clone());
        if *fail_first {
            *fail_first = false;
            return Err(ProcessingError::transient("transport refused connection"));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Recorder"
    }
}

fn bus_config() -> BusConfig {
    BusConfig::default().with_max_redeliveries(3)
}

async fn wait_for_depth(broker: &InMemoryBroker, queue: &str, depth: usize) {
    for _ in 0..200 {
        if broker.queue_depth(queue).await == depth {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("queue {} never reached depth {}", queue, depth);
}

#[tokio::test]
async fn test_channels_receive_only_their_events() {
    let broker = InMemoryBroker::new();
    let config = bus_config();
    let email = ChannelConsumer::new(
        Arc::new(broker.clone()),
        Recorder::default(),
        ConsumerConfig::for_channel::<MailChannel>(&config),
    );
    let inbox = ChannelConsumer::new(
        Arc::new(broker.clone()),
        Recorder::default(),
        ConsumerConfig::for_channel::<InboxChannel>(&config),
    );
    email.declare().await.unwrap();
    inbox.declare().await.unwrap();

    let (bus, _dispatcher) = EventBus::from_config(Arc::new(broker.clone()), &config);
    let event = Envelope {
        event_type: "task.node.executor.changed".to_string(),
    };
    bus.publish(&MailChannel::routing_key(&event.event_type), &event)
        .unwrap();
    bus.publish(&InboxChannel::routing_key("employee.leave"), &Envelope {
        event_type: "employee.leave".to_string(),
    })
    .unwrap();

    wait_for_depth(&broker, "email.events", 1).await;
    wait_for_depth(&broker, "notification.events", 1).await;

    let mut stream = broker.consume("email.events", "test").await.unwrap();
    let delivery = stream.next().await.unwrap().unwrap();
    assert_eq!(delivery.routing_key, "email.task.node.executor.changed");
    assert_eq!(email.handle_delivery(delivery).await, Disposition::Acked);
    assert_eq!(
        *email.handler().seen.lock().await,
        vec!["task.node.executor.changed".to_string()]
    );
}

#[tokio::test]
async fn test_poison_message_rejected_once_and_never_redelivered() {
    let broker = InMemoryBroker::new();
    let consumer = ChannelConsumer::new(
        Arc::new(broker.clone()),
        Recorder::default(),
        ConsumerConfig::for_channel::<MailChannel>(&bus_config()),
    );
    consumer.declare().await.unwrap();

    broker
        .publish("domain.events", "email.task.completed", b"{not json")
        .await
        .unwrap();

    let mut stream = broker.consume("email.events", "test").await.unwrap();
    let delivery = stream.next().await.unwrap().unwrap();
    assert_eq!(consumer.handle_delivery(delivery).await, Disposition::Rejected);

    let stats = broker.queue_stats("email.events").await.unwrap();
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.requeued, 0);
    assert_eq!(broker.queue_depth("email.events").await, 0);
    assert!(consumer.handler().seen.lock().await.is_empty());
}

#[tokio::test]
async fn test_transient_failure_redelivers_once_then_acks() {
    let broker = InMemoryBroker::new();
    let handler = Recorder {
        fail_first: Mutex::new(true),
        ..Recorder::default()
    };
    let consumer = ChannelConsumer::new(
        Arc::new(broker.clone()),
        handler,
        ConsumerConfig::for_channel::<MailChannel>(&bus_config()),
    );
    consumer.declare().await.unwrap();

    broker
        .publish("domain.events", "email.task.completed", br#"{"eventType":"task.completed"}"#)
        .await
        .unwrap();

    let mut stream = broker.consume("email.events", "test").await.unwrap();
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(consumer.handle_delivery(first).await, Disposition::Requeued);

    let second = stream.next().await.unwrap().unwrap();
    assert!(second.redelivered);
    assert_eq!(second.attempt, 2);
    assert_eq!(consumer.handle_delivery(second).await, Disposition::Acked);

    let stats = broker.queue_stats("email.events").await.unwrap();
    assert_eq!(stats.requeued, 1);
    assert_eq!(stats.acked, 1);
    assert_eq!(broker.queue_depth("email.events").await, 0);
}
