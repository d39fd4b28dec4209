use std::hash::BuildHasher;
use std::sync::{PoisonError, RwLock};

use bytes::Bytes;
use chrono::Utc;
use tokio::sync::{mpsc, watch};

use crate::prelude::*;
use crate::runtime::Record;

/// Record delivered to a partition.
#[derive(Debug)]
pub struct Delivery {
    pub topic: String,
    pub record: Record,
}

pub type Partition = mpsc::UnboundedReceiver<Delivery>;

/// In-process message bus.
///
/// Every subscriber group of a topic receives each record once, on the partition
/// selected by the record key.
#[derive(Clone)]
pub struct Broker(Arc<Inner>);

struct Inner {
    subscriptions: RwLock<AHashMap<String, Vec<Subscription>>>,

    /// Records published but not yet marked as done.
    in_flight: watch::Sender<usize>,
}

type Subscription = Arc<Vec<mpsc::UnboundedSender<Delivery>>>;

impl Default for Broker {
    fn default() -> Self {
        let (in_flight, _) = watch::channel(0);
        Self(Arc::new(Inner {
            subscriptions: RwLock::default(),
            in_flight,
        }))
    }
}

impl Broker {
    /// Subscribes a new group to the topics and returns its partitions.
    pub fn subscribe(&self, topics: &[&str], n_partitions: usize) -> Vec<Partition> {
        assert!(n_partitions >= 1, "at least one partition is needed");
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..n_partitions).map(|_| mpsc::unbounded_channel()).unzip();
        let subscription = Arc::new(senders);
        let mut subscriptions =
            self.0.subscriptions.write().unwrap_or_else(PoisonError::into_inner);
        for topic in topics {
            subscriptions
                .entry(topic.to_string())
                .or_default()
                .push(Arc::clone(&subscription));
        }
        debug!(?topics, n_partitions, "subscribed");
        receivers
    }

    /// Publishes the record to every group subscribed to the topic.
    ///
    /// Each delivery stays in flight until the consumer calls [`Broker::done`].
    pub fn publish(&self, topic: &str, key: &str, payload: Bytes) {
        let subscriptions = self.0.subscriptions.read().unwrap_or_else(PoisonError::into_inner);
        let subscriptions = match subscriptions.get(topic) {
            Some(subscriptions) => subscriptions,
            None => {
                trace!(topic, key, "no subscribers, dropped");
                return;
            }
        };
        let record = Record {
            key: key.to_owned(),
            timestamp: Utc::now(),
            payload,
        };
        for partitions in subscriptions {
            let partition = &partitions[partition_of(key, partitions.len())];
            self.0.in_flight.send_modify(|n| *n += 1);
            let delivery = Delivery {
                topic: topic.to_owned(),
                record: record.clone(),
            };
            if partition.send(delivery).is_err() {
                // Only happens once the consumer has stopped.
                debug!(topic, key, "partition is closed, dropped");
                self.done();
            }
        }
    }

    /// Marks a delivered record as processed.
    pub fn done(&self) {
        self.0.in_flight.send_modify(|n| *n = n.saturating_sub(1));
    }

    #[must_use]
    pub fn n_in_flight(&self) -> usize {
        *self.0.in_flight.borrow()
    }

    /// Waits until every published record is processed.
    pub async fn wait_idle(&self) {
        let mut in_flight = self.0.in_flight.subscribe();
        // The sender lives as long as `self`.
        let _ = in_flight.wait_for(|n| *n == 0).await;
    }
}

/// Partition of the key. Stable within the process.
#[must_use]
pub fn partition_of(key: &str, n_partitions: usize) -> usize {
    let state = ahash::RandomState::with_seeds(0, 0, 0, 0);
    (BuildHasher::hash_one(&state, key) % n_partitions as u64) as usize
}
