//! Prometheus metrics for publishers and channel consumers

use crate::channel::channel_of;
use crate::consumer::Disposition;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::time::Duration;
use tracing::{info, warn};

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder.
///
/// Call once at startup; later calls return the existing handle. Returns
/// `None` when another recorder is already installed.
pub fn init_metrics() -> Option<&'static PrometheusHandle> {
    match PROMETHEUS_HANDLE.get_or_try_init(|| PrometheusBuilder::new().install_recorder()) {
        Ok(handle) => {
            info!("Prometheus metrics initialized");
            Some(handle)
        }
        Err(e) => {
            warn!(error = %e, "Failed to install Prometheus recorder");
            None
        }
    }
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    PROMETHEUS_HANDLE
        .get()
        .map(|h| h.render())
        .unwrap_or_default()
}

/// Publishing-side metrics
#[derive(Clone, Debug)]
pub struct BusMetrics {
    exchange: String,
}

impl BusMetrics {
    pub fn new(exchange: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
        }
    }

    /// Event accepted into the outbound queue
    pub fn event_queued(&self, routing_key: &str) {
        counter!(
            "event_bus_events_queued_total",
            "exchange" => self.exchange.clone(),
            "channel" => channel_of(routing_key).to_string()
        )
        .increment(1);
    }

    /// Event refused before reaching the outbound queue
    pub fn event_dropped(&self, reason: &'static str) {
        counter!(
            "event_bus_events_dropped_total",
            "exchange" => self.exchange.clone(),
            "reason" => reason
        )
        .increment(1);
    }

    /// Event confirmed by the broker
    pub fn event_published(&self, routing_key: &str) {
        counter!(
            "event_bus_events_published_total",
            "exchange" => self.exchange.clone(),
            "channel" => channel_of(routing_key).to_string()
        )
        .increment(1);
    }

    pub fn publish_failed(&self, routing_key: &str) {
        counter!(
            "event_bus_publish_failures_total",
            "exchange" => self.exchange.clone(),
            "channel" => channel_of(routing_key).to_string()
        )
        .increment(1);
    }
}

/// Consumer-side metrics for one queue
#[derive(Clone, Debug)]
pub struct ConsumerMetrics {
    queue: String,
    handler: String,
}

impl ConsumerMetrics {
    pub fn new(queue: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            handler: handler.into(),
        }
    }

    pub fn message_received(&self) {
        counter!(
            "event_bus_messages_received_total",
            "queue" => self.queue.clone(),
            "handler" => self.handler.clone()
        )
        .increment(1);
    }

    /// Record how a message was settled and how long handling took
    pub fn message_settled(&self, disposition: Disposition, duration: Duration) {
        counter!(
            "event_bus_messages_settled_total",
            "queue" => self.queue.clone(),
            "handler" => self.handler.clone(),
            "disposition" => disposition.as_str()
        )
        .increment(1);

        histogram!(
            "event_bus_message_duration_seconds",
            "queue" => self.queue.clone(),
            "handler" => self.handler.clone()
        )
        .record(duration.as_secs_f64());
    }

    pub fn settle_failed(&self) {
        counter!(
            "event_bus_settle_failures_total",
            "queue" => self.queue.clone(),
            "handler" => self.handler.clone()
        )
        .increment(1);
    }
}
