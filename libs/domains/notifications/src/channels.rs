//! The two delivery channels and their queue topology.

use event_bus::ChannelDef;
use serde::Serialize;

use crate::events::EventType;

/// Email channel: `email.<eventType>` → `email.events`.
pub struct EmailChannel;

impl ChannelDef for EmailChannel {
    const CHANNEL: &'static str = "email";
    const QUEUE_NAME: &'static str = "email.events";
    const DEAD_LETTER_QUEUE: &'static str = "email.events.dlq";
}

/// In-app notification channel: `notification.<eventType>` → `notification.events`.
pub struct NotificationChannel;

impl ChannelDef for NotificationChannel {
    const CHANNEL: &'static str = "notification";
    const QUEUE_NAME: &'static str = "notification.events";
    const DEAD_LETTER_QUEUE: &'static str = "notification.events.dlq";
}

/// Runtime handle for a channel, used to key templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Notification,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Email, Channel::Notification];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => EmailChannel::CHANNEL,
            Channel::Notification => NotificationChannel::CHANNEL,
        }
    }

    /// Template name for an event on this channel: `<channel>.<eventType>`.
    pub fn template_name(&self, event_type: EventType) -> String {
        format!("{}.{}", self.as_str(), event_type.as_str())
    }

    pub fn routing_key(&self, event_type: EventType) -> String {
        match self {
            Channel::Email => EmailChannel::routing_key(event_type.as_str()),
            Channel::Notification => NotificationChannel::routing_key(event_type.as_str()),
        }
    }
}
