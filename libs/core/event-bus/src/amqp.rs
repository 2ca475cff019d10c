//! RabbitMQ backend built on lapin.
//!
//! - one publishing channel in confirm mode, shared by every publisher
//! - one channel per consumer, with `basic_qos(prefetch)`
//! - quorum queues so the broker tracks `x-delivery-count` across requeues

use crate::broker::{Acknowledger, Broker, Delivery, DeliveryStream, QueueSpec};
use crate::config::BusConfig;
use crate::error::{BusError, BusResult};
use async_trait::async_trait;
use futures::StreamExt;
use lapin::acker::Acker;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::types::{AMQPValue, FieldTable};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tokio::sync::Mutex;
use tracing::{debug, info};

const DELIVERY_COUNT_HEADER: &str = "x-delivery-count";

/// AMQP 0-9-1 broker connection.
pub struct AmqpBroker {
    connection: Connection,
    publish_channel: Channel,
    prefetch: u16,
    consumer_channels: Mutex<Vec<Channel>>,
}

impl AmqpBroker {
    /// Connect and open the publishing channel.
    pub async fn connect(config: &BusConfig) -> BusResult<Self> {
        let properties = ConnectionProperties::default()
            .with_connection_name(config.connection_name.clone().into());

        let connection = Connection::connect(&config.amqp_url, properties).await?;
        let publish_channel = connection.create_channel().await?;
        publish_channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;

        info!(
            connection_name = %config.connection_name,
            prefetch = config.prefetch,
            "Connected to AMQP broker"
        );

        Ok(Self {
            connection,
            publish_channel,
            prefetch: config.prefetch,
            consumer_channels: Mutex::new(Vec::new()),
        })
    }
}

fn durable_queue_options() -> QueueDeclareOptions {
    QueueDeclareOptions {
        durable: true,
        exclusive: false,
        auto_delete: false,
        ..QueueDeclareOptions::default()
    }
}

fn queue_arguments(spec: &QueueSpec) -> FieldTable {
    let mut args = FieldTable::default();
    args.insert("x-queue-type".into(), AMQPValue::LongString("quorum".into()));
    if let Some(limit) = spec.delivery_limit {
        let limit = i32::try_from(limit).unwrap_or(i32::MAX);
        args.insert("x-delivery-limit".into(), AMQPValue::LongInt(limit));
    }
    if let Some(dlq) = &spec.dead_letter_queue {
        // Default exchange routes by queue name.
        args.insert("x-dead-letter-exchange".into(), AMQPValue::LongString("".into()));
        args.insert(
            "x-dead-letter-routing-key".into(),
            AMQPValue::LongString(dlq.clone().into()),
        );
    }
    args
}

fn delivery_count(properties: &BasicProperties) -> Option<u32> {
    let headers = properties.headers().as_ref()?;
    let (_, value) = headers
        .inner()
        .iter()
        .find(|(key, _)| key.as_str() == DELIVERY_COUNT_HEADER)?;

    match value {
        AMQPValue::LongLongInt(v) => u32::try_from(*v).ok(),
        AMQPValue::LongInt(v) => u32::try_from(*v).ok(),
        AMQPValue::LongUInt(v) => Some(*v),
        AMQPValue::ShortInt(v) => u32::try_from(*v).ok(),
        AMQPValue::ShortUInt(v) => Some(u32::from(*v)),
        _ => None,
    }
}

fn into_delivery(delivery: lapin::message::Delivery) -> Delivery {
    let attempt = match delivery_count(&delivery.properties) {
        Some(previous) => previous.saturating_add(1),
        None if delivery.redelivered => 2,
        None => 1,
    };
    let routing_key = delivery.routing_key.to_string();

    Delivery::new(
        routing_key,
        delivery.data,
        delivery.redelivered,
        attempt,
        AmqpAcker {
            acker: delivery.acker,
        },
    )
}

struct AmqpAcker {
    acker: Acker,
}

#[async_trait]
impl Acknowledger for AmqpAcker {
    async fn ack(&self) -> BusResult<()> {
        self.acker
            .ack(BasicAckOptions::default())
            .await
            .map(|_| ())
            .map_err(BusError::from)
    }

    async fn nack(&self, requeue: bool) -> BusResult<()> {
        self.acker
            .nack(BasicNackOptions {
                requeue,
                ..BasicNackOptions::default()
            })
            .await
            .map(|_| ())
            .map_err(BusError::from)
    }
}

#[async_trait]
impl Broker for AmqpBroker {
    async fn declare_exchange(&self, exchange: &str) -> BusResult<()> {
        self.publish_channel
            .exchange_declare(
                exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    auto_delete: false,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;
        debug!(exchange = %exchange, "Declared topic exchange");
        Ok(())
    }

    async fn declare_queue(&self, spec: &QueueSpec) -> BusResult<()> {
        if let Some(dlq) = &spec.dead_letter_queue {
            self.publish_channel
                .queue_declare(dlq, durable_queue_options(), FieldTable::default())
                .await?;
        }

        self.publish_channel
            .queue_declare(&spec.queue, durable_queue_options(), queue_arguments(spec))
            .await?;

        self.publish_channel
            .queue_bind(
                &spec.queue,
                &spec.exchange,
                &spec.binding_pattern,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        info!(
            queue = %spec.queue,
            exchange = %spec.exchange,
            pattern = %spec.binding_pattern,
            "Declared and bound queue"
        );
        Ok(())
    }

    async fn publish(&self, exchange: &str, routing_key: &str, payload: &[u8]) -> BusResult<()> {
        let confirmation = self
            .publish_channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default()
                    .with_delivery_mode(2)
                    .with_content_type("application/json".into()),
            )
            .await?
            .await?;

        if let Confirmation::Nack(_) = confirmation {
            return Err(BusError::Topology(format!(
                "broker refused message for '{}'",
                routing_key
            )));
        }
        Ok(())
    }

    async fn consume(&self, queue: &str, consumer_tag: &str) -> BusResult<DeliveryStream> {
        let channel = self.connection.create_channel().await?;
        channel
            .basic_qos(self.prefetch, BasicQosOptions::default())
            .await?;

        let consumer = channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        self.consumer_channels.lock().await.push(channel);
        info!(queue = %queue, consumer_tag = %consumer_tag, "Started AMQP consumer");

        let stream = consumer.map(|item| item.map(into_delivery).map_err(BusError::from));
        Ok(stream.boxed())
    }

    async fn health_check(&self) -> BusResult<()> {
        if self.connection.status().connected() {
            Ok(())
        } else {
            Err(BusError::Closed)
        }
    }

    /// In-flight unacked deliveries return to their queues.
    async fn close(&self) -> BusResult<()> {
        self.connection.close(200, "shutdown").await?;
        info!("AMQP connection closed");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "amqp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapin::types::ShortString;

    fn spec() -> QueueSpec {
        QueueSpec {
            exchange: "domain.events".to_string(),
            queue: "email.events".to_string(),
            binding_pattern: "email.#".to_string(),
            dead_letter_queue: Some("email.events.dlq".to_string()),
            delivery_limit: Some(5),
        }
    }

    fn header(args: &FieldTable, key: &str) -> Option<AMQPValue> {
        args.inner()
            .iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, v)| v.clone())
    }

    #[test]
    fn test_queue_arguments_declare_quorum_with_dead_letter() {
        let args = queue_arguments(&spec());
        assert_eq!(
            header(&args, "x-queue-type"),
            Some(AMQPValue::LongString("quorum".into()))
        );
        assert_eq!(header(&args, "x-delivery-limit"), Some(AMQPValue::LongInt(5)));
        assert_eq!(
            header(&args, "x-dead-letter-routing-key"),
            Some(AMQPValue::LongString("email.events.dlq".into()))
        );
    }

    #[test]
    fn test_delivery_count_header() {
        let mut headers = FieldTable::default();
        headers.insert(
            ShortString::from(DELIVERY_COUNT_HEADER),
            AMQPValue::LongLongInt(2),
        );
        let properties = BasicProperties::default().with_headers(headers);
        assert_eq!(delivery_count(&properties), Some(2));
        assert_eq!(delivery_count(&BasicProperties::default()), None);
    }
}
