//! Topic-based fan-out of per-cycle price updates.
//!
//! The engine only depends on the [`Publisher`] capability. `BroadcastHub` is the
//! in-process implementation: every subscriber owns a bounded `crossbeam_channel`
//! queue and publishing never waits on it.
//!
//! Delivery rules:
//! - Every subscriber of a topic receives the same `Arc<PriceUpdate>`, in publish order.
//! - A subscriber whose queue is full misses that update; it stays subscribed.
//! - A subscriber whose `Subscription` was dropped is pruned on the next publish.
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use log::{debug, warn};
use market_common::{PriceUpdate, Result};

/// Default per-subscriber queue length.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 64;

/// Counters describing one publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers that accepted the update.
    pub delivered: usize,
    /// Subscribers whose queue was full.
    pub dropped: usize,
    /// Subscribers that had gone away and were removed.
    pub pruned: usize,
}

/// Capability to push one payload to every current subscriber of `topic`.
pub trait Publisher: Send + Sync {
    /// Publish without blocking on any subscriber.
    fn publish(&self, topic: &str, update: Arc<PriceUpdate>) -> Result<PublishReport>;
}

struct Subscriber {
    id: u64,
    tx: Sender<Arc<PriceUpdate>>,
}

/// In-process topic registry.
pub struct BroadcastHub {
    topics: Mutex<HashMap<String, Vec<Subscriber>>>,
    capacity: usize,
    next_id: AtomicU64,
}

/// Receiving end handed to a subscriber. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    topic: String,
    rx: Receiver<Arc<PriceUpdate>>,
}

impl Subscription {
    /// Subscriber id, unique per hub.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Topic this subscription follows.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Underlying receiver, for use in `select!`.
    pub fn receiver(&self) -> &Receiver<Arc<PriceUpdate>> {
        &self.rx
    }

    /// Wait up to `timeout` for the next update.
    pub fn recv_timeout(&self, timeout: Duration) -> std::result::Result<Arc<PriceUpdate>, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    /// Take an already queued update, if any.
    pub fn try_recv(&self) -> Option<Arc<PriceUpdate>> {
        self.rx.try_recv().ok()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

impl BroadcastHub {
    /// Creates a hub whose subscribers buffer up to `capacity` updates each.
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new subscriber on `topic`.
    pub fn subscribe(&self, topic: &str) -> Result<Subscription> {
        let (tx, rx) = bounded(self.capacity);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut topics = self.topics.lock()?;
        let subscribers = topics.entry(String::from(topic)).or_default();
        subscribers.push(Subscriber { id, tx });
        debug!("Subscriber {} joined '{}' ({} total)", id, topic, subscribers.len());
        Ok(Subscription {
            id,
            topic: String::from(topic),
            rx,
        })
    }

    /// Live subscribers currently registered on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> Result<usize> {
        let topics = self.topics.lock()?;
        Ok(topics.get(topic).map_or(0, |subs| subs.len()))
    }
}

impl Publisher for BroadcastHub {
    fn publish(&self, topic: &str, update: Arc<PriceUpdate>) -> Result<PublishReport> {
        let mut report = PublishReport::default();
        let mut topics = self.topics.lock()?;
        let Some(subscribers) = topics.get_mut(topic) else {
            return Ok(report);
        };
        subscribers.retain(|subscriber| match subscriber.tx.try_send(Arc::clone(&update)) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Subscriber {} on '{}' is lagging; cycle {} not delivered",
                    subscriber.id, topic, update.cycle
                );
                report.dropped += 1;
                true
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("Subscriber {} left '{}'", subscriber.id, topic);
                report.pruned += 1;
                false
            }
        });
        if subscribers.is_empty() {
            topics.remove(topic);
        }
        Ok(report)
    }
}
