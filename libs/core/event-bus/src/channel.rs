//! Channel definitions and topic routing.
//!
//! A channel (`email`, `notification`, ...) owns one durable queue bound to the
//! topic exchange. Routing keys are `<channel>.<eventType>`; event types are
//! dotted themselves, so the queue binds `<channel>.#`.

/// Static description of a consumer channel.
///
/// # Example
///
/// ```rust
/// use event_bus::ChannelDef;
///
/// struct AuditChannel;
///
/// impl ChannelDef for AuditChannel {
///     const CHANNEL: &'static str = "audit";
///     const QUEUE_NAME: &'static str = "audit.events";
///     const DEAD_LETTER_QUEUE: &'static str = "audit.events.dlq";
/// }
///
/// assert_eq!(AuditChannel::routing_key("user.login"), "audit.user.login");
/// assert_eq!(AuditChannel::binding_pattern(), "audit.#");
/// ```
pub trait ChannelDef: Send + Sync + 'static {
    /// First routing-key segment for this channel.
    const CHANNEL: &'static str;

    /// Durable queue consumed by this channel's loop.
    const QUEUE_NAME: &'static str;

    /// Queue receiving rejected and retry-exhausted messages.
    const DEAD_LETTER_QUEUE: &'static str;

    fn routing_key(event_type: &str) -> String {
        format!("{}.{}", Self::CHANNEL, event_type)
    }

    fn binding_pattern() -> String {
        format!("{}.#", Self::CHANNEL)
    }
}

/// AMQP topic matching: `*` matches exactly one word, `#` zero or more.
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    matches_words(&pattern, &key)
}

fn matches_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| matches_words(rest, &key[skip..])),
        Some((&"*", rest)) => !key.is_empty() && matches_words(rest, &key[1..]),
        Some((word, rest)) => key.first() == Some(word) && matches_words(rest, &key[1..]),
    }
}

/// Channel segment of a routing key, used as a low-cardinality metric label.
pub(crate) fn channel_of(routing_key: &str) -> &str {
    routing_key.split('.').next().unwrap_or(routing_key)
}
