//! Typed, fire-and-forget publishers used by business code.
//!
//! `publish` never fails the caller: bus errors are logged and dropped.

use event_bus::{ChannelDef, EventBus};
use tracing::{debug, warn};

use crate::channels::{EmailChannel, NotificationChannel};
use crate::events::{EmailEvent, NotificationEvent};

#[derive(Clone)]
pub struct EmailPublisher {
    bus: EventBus,
}

impl EmailPublisher {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    pub fn publish(&self, event: EmailEvent) {
        let routing_key = EmailChannel::routing_key(event.event_type.as_str());
        match self.bus.publish(&routing_key, &event) {
            Ok(()) => debug!(routing_key = %routing_key, "Email event queued"),
            Err(e) => warn!(routing_key = %routing_key, error = %e, "Failed to publish email event"),
        }
    }
}

#[derive(Clone)]
pub struct NotificationPublisher {
    bus: EventBus,
}

impl NotificationPublisher {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    pub fn publish(&self, event: NotificationEvent) {
        let routing_key = NotificationChannel::routing_key(event.event_type.as_str());
        match self.bus.publish(&routing_key, &event) {
            Ok(()) => debug!(routing_key = %routing_key, "Notification event queued"),
            Err(e) => warn!(routing_key = %routing_key, error = %e, "Failed to publish notification event"),
        }
    }
}
