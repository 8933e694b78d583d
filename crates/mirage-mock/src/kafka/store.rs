//! In-memory event sink for scenario output.
//!
//! One FIFO per topic. This is not a broker: there are no partitions,
//! offsets or consumer groups, and nothing survives a restart.

use super::model::KafkaMessage;
use crate::metrics;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub trait KafkaStore: Send + Sync {
    fn publish(&self, topic: &str, message: KafkaMessage);
    /// Copy of the topic's queue, oldest first. Does not consume.
    fn peek(&self, topic: &str) -> Vec<KafkaMessage>;
    /// Pop the oldest message. Each message is handed to exactly one caller.
    fn take(&self, topic: &str) -> Option<KafkaMessage>;
    /// Discard a topic's queue. Returns the number of messages dropped.
    fn clear(&self, topic: &str) -> usize;
    /// Published minus consumed, across all topics.
    fn lag(&self) -> u64;
}

type TopicQueue = Arc<Mutex<VecDeque<KafkaMessage>>>;

#[derive(Default)]
pub struct InMemoryKafkaStore {
    topics: DashMap<String, TopicQueue>,
    published: AtomicU64,
    consumed: AtomicU64,
}

impl InMemoryKafkaStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self, topic: &str) -> Option<TopicQueue> {
        self.topics.get(topic).map(|q| Arc::clone(q.value()))
    }

    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.topics.iter().map(|e| e.key().clone()).collect();
        topics.sort();
        topics
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Acquire)
    }

    pub fn consumed(&self) -> u64 {
        self.consumed.load(Ordering::Acquire)
    }
}

impl KafkaStore for InMemoryKafkaStore {
    fn publish(&self, topic: &str, message: KafkaMessage) {
        let queue = self
            .topics
            .entry(topic.to_string())
            .or_default()
            .value()
            .clone();
        queue.lock().push_back(message);
        self.published.fetch_add(1, Ordering::AcqRel);
        metrics::record_kafka_publish(topic);
    }

    fn peek(&self, topic: &str) -> Vec<KafkaMessage> {
        self.queue(topic)
            .map(|q| q.lock().iter().cloned().collect())
            .unwrap_or_default()
    }

    fn take(&self, topic: &str) -> Option<KafkaMessage> {
        let message = self.queue(topic)?.lock().pop_front()?;
        self.consumed.fetch_add(1, Ordering::AcqRel);
        Some(message)
    }

    fn clear(&self, topic: &str) -> usize {
        let Some(queue) = self.queue(topic) else {
            return 0;
        };
        let dropped = {
            let mut guard = queue.lock();
            let n = guard.len();
            guard.clear();
            n
        };
        self.consumed.fetch_add(dropped as u64, Ordering::AcqRel);
        dropped
    }

    fn lag(&self) -> u64 {
        // a take can land before the matching publish is counted
        let consumed = self.consumed.load(Ordering::Acquire);
        let published = self.published.load(Ordering::Acquire);
        published.saturating_sub(consumed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kafka::model::fixtures::message;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn test_fifo_per_topic() {
        let store = InMemoryKafkaStore::new();
        store.publish("a", message("a", "k1", "1", 1));
        store.publish("b", message("b", "k2", "2", 1));
        store.publish("a", message("a", "k3", "3", 1));

        let keys: Vec<_> = store.peek("a").into_iter().map(|m| m.key).collect();
        assert_eq!(keys, vec!["k1", "k3"]);
        // peek is non-destructive
        assert_eq!(store.peek("a").len(), 2);

        assert_eq!(store.take("a").unwrap().key, "k1");
        assert_eq!(store.take("a").unwrap().key, "k3");
        assert!(store.take("a").is_none());
        assert!(store.take("missing").is_none());
        assert_eq!(store.topics(), vec!["a", "b"]);
    }

    #[test]
    fn test_lag_accounting() {
        let store = InMemoryKafkaStore::new();
        for i in 0..5 {
            store.publish("t", message("t", &format!("k{i}"), "v", 1));
        }
        assert_eq!(store.lag(), 5);
        store.take("t");
        assert_eq!(store.lag(), 4);
        assert_eq!(store.clear("t"), 4);
        assert_eq!(store.lag(), 0);
        assert_eq!(store.clear("t"), 0);
        assert_eq!(store.clear("unknown"), 0);
    }

    #[test]
    fn test_take_is_exactly_once_under_concurrency() {
        const N: usize = 200;
        let store = Arc::new(InMemoryKafkaStore::new());
        for i in 0..N {
            store.publish("orders", message("orders", &format!("k{i}"), "v", 1));
        }

        let workers: Vec<_> = (0..N + 1)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.take("orders").map(|m| m.key))
            })
            .collect();
        let results: Vec<Option<String>> = workers.into_iter().map(|w| w.join().unwrap()).collect();

        let taken: Vec<String> = results.iter().flatten().cloned().collect();
        assert_eq!(taken.len(), N);
        let distinct: HashSet<_> = taken.iter().collect();
        assert_eq!(distinct.len(), N);
        assert_eq!(results.iter().filter(|r| r.is_none()).count(), 1);
        assert_eq!(store.lag(), 0);
    }

    #[test]
    fn test_concurrent_publishers() {
        let store = Arc::new(InMemoryKafkaStore::new());
        let workers: Vec<_> = (0..8)
            .map(|w| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..100 {
                        store.publish("t", message("t", &format!("{w}-{i}"), "v", 1));
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        assert_eq!(store.peek("t").len(), 800);
        assert_eq!(store.published(), 800);
    }
}
