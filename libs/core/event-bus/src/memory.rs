//! In-process broker with topic-exchange semantics.
//!
//! Used by tests and by local runs without RabbitMQ. Requeued messages come
//! back with `attempt + 1` and `redelivered = true`; `nack(requeue = false)`
//! parks the message on the queue's dead-letter queue when one is declared.

use crate::broker::{Acknowledger, Broker, Delivery, DeliveryStream, QueueSpec};
use crate::channel::topic_matches;
use crate::error::{BusError, BusResult};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{Mutex, Notify};
use tracing::debug;

/// Settlement counters for one queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub enqueued: u64,
    pub acked: u64,
    pub requeued: u64,
    pub rejected: u64,
}

#[derive(Debug, Clone)]
struct Envelope {
    routing_key: String,
    body: Vec<u8>,
    attempt: u32,
}

struct MemoryQueue {
    messages: Mutex<VecDeque<Envelope>>,
    notify: Notify,
    dead_letter: Option<Arc<MemoryQueue>>,
    consuming: AtomicBool,
    enqueued: AtomicU64,
    acked: AtomicU64,
    requeued: AtomicU64,
    rejected: AtomicU64,
}

impl MemoryQueue {
    fn new(dead_letter: Option<Arc<MemoryQueue>>) -> Self {
        Self {
            messages: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            dead_letter,
            consuming: AtomicBool::new(false),
            enqueued: AtomicU64::new(0),
            acked: AtomicU64::new(0),
            requeued: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    async fn push(&self, envelope: Envelope) {
        self.messages.lock().await.push_back(envelope);
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        self.notify.notify_one();
    }

    async fn pop(&self) -> Envelope {
        loop {
            if let Some(envelope) = self.messages.lock().await.pop_front() {
                return envelope;
            }
            self.notify.notified().await;
        }
    }

    fn stats(&self) -> QueueStats {
        QueueStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            acked: self.acked.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Frees the queue for a new consumer when its delivery stream is dropped.
struct ConsumerGuard {
    queue: Arc<MemoryQueue>,
}

impl Drop for ConsumerGuard {
    fn drop(&mut self) {
        self.queue.consuming.store(false, Ordering::SeqCst);
    }
}

struct Binding {
    exchange: String,
    pattern: String,
    queue: String,
}

#[derive(Default)]
struct BrokerState {
    exchanges: HashSet<String>,
    queues: HashMap<String, Arc<MemoryQueue>>,
    bindings: Vec<Binding>,
}

/// In-memory topic broker. Cloning shares the same exchanges and queues.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages waiting in `queue` (not counting one currently being handled).
    pub async fn queue_depth(&self, queue: &str) -> usize {
        let queue = self.state.lock().await.queues.get(queue).cloned();
        match queue {
            Some(q) => q.messages.lock().await.len(),
            None => 0,
        }
    }

    pub async fn queue_stats(&self, queue: &str) -> Option<QueueStats> {
        self.state.lock().await.queues.get(queue).map(|q| q.stats())
    }

    /// Drain and return the raw bodies parked on `queue` without settling them.
    pub async fn drain(&self, queue: &str) -> Vec<Vec<u8>> {
        let queue = self.state.lock().await.queues.get(queue).cloned();
        match queue {
            Some(q) => q.messages.lock().await.drain(..).map(|e| e.body).collect(),
            None => Vec::new(),
        }
    }
}

struct MemoryAcker {
    queue: Arc<MemoryQueue>,
    envelope: Envelope,
}

#[async_trait]
impl Acknowledger for MemoryAcker {
    async fn ack(&self) -> BusResult<()> {
        self.queue.acked.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn nack(&self, requeue: bool) -> BusResult<()> {
        let mut envelope = self.envelope.clone();
        if requeue {
            self.queue.requeued.fetch_add(1, Ordering::Relaxed);
            envelope.attempt += 1;
            self.queue.push(envelope).await;
        } else {
            self.queue.rejected.fetch_add(1, Ordering::Relaxed);
            if let Some(dlq) = &self.queue.dead_letter {
                dlq.push(envelope).await;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn declare_exchange(&self, exchange: &str) -> BusResult<()> {
        self.state.lock().await.exchanges.insert(exchange.to_string());
        Ok(())
    }

    async fn declare_queue(&self, spec: &QueueSpec) -> BusResult<()> {
        let mut state = self.state.lock().await;
        if !state.exchanges.contains(&spec.exchange) {
            return Err(BusError::Topology(format!(
                "exchange '{}' is not declared",
                spec.exchange
            )));
        }

        let dead_letter = spec.dead_letter_queue.as_ref().map(|name| {
            state
                .queues
                .entry(name.clone())
                .or_insert_with(|| Arc::new(MemoryQueue::new(None)))
                .clone()
        });

        state
            .queues
            .entry(spec.queue.clone())
            .or_insert_with(|| Arc::new(MemoryQueue::new(dead_letter)));

        let already_bound = state.bindings.iter().any(|b| {
            b.exchange == spec.exchange && b.pattern == spec.binding_pattern && b.queue == spec.queue
        });
        if !already_bound {
            state.bindings.push(Binding {
                exchange: spec.exchange.clone(),
                pattern: spec.binding_pattern.clone(),
                queue: spec.queue.clone(),
            });
        }

        debug!(queue = %spec.queue, pattern = %spec.binding_pattern, "Declared in-memory queue");
        Ok(())
    }

    async fn publish(&self, exchange: &str, routing_key: &str, payload: &[u8]) -> BusResult<()> {
        let targets: Vec<Arc<MemoryQueue>> = {
            let state = self.state.lock().await;
            if !state.exchanges.contains(exchange) {
                return Err(BusError::Topology(format!(
                    "exchange '{}' is not declared",
                    exchange
                )));
            }
            let mut seen = HashSet::new();
            state
                .bindings
                .iter()
                .filter(|b| b.exchange == exchange && topic_matches(&b.pattern, routing_key))
                .filter(|b| seen.insert(b.queue.clone()))
                .filter_map(|b| state.queues.get(&b.queue).cloned())
                .collect()
        };

        if targets.is_empty() {
            debug!(routing_key = %routing_key, "No binding matched, message dropped");
        }

        for queue in targets {
            queue
                .push(Envelope {
                    routing_key: routing_key.to_string(),
                    body: payload.to_vec(),
                    attempt: 1,
                })
                .await;
        }
        Ok(())
    }

    async fn consume(&self, queue: &str, _consumer_tag: &str) -> BusResult<DeliveryStream> {
        let queue_ref = self
            .state
            .lock()
            .await
            .queues
            .get(queue)
            .cloned()
            .ok_or_else(|| BusError::Topology(format!("queue '{}' is not declared", queue)))?;

        if queue_ref.consuming.swap(true, Ordering::SeqCst) {
            return Err(BusError::Topology(format!(
                "queue '{}' already has a consumer",
                queue
            )));
        }

        let guard = ConsumerGuard { queue: queue_ref };
        let stream = futures::stream::unfold(guard, |guard| async move {
            let queue = guard.queue.clone();
            let envelope = queue.pop().await;
            let delivery = Delivery::new(
                envelope.routing_key.clone(),
                envelope.body.clone(),
                envelope.attempt > 1,
                envelope.attempt,
                MemoryAcker { queue, envelope },
            );
            Some((Ok(delivery), guard))
        });

        Ok(stream.boxed())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
