//! In-memory event bus implementation using tokio broadcast channels.
//!
//! This implementation is suitable for:
//! - Single process deployments (one store, many sessions)
//! - Development and testing
//!
//! Events are only broadcast within a single process.

use async_trait::async_trait;
use cohort_events::{ChangeEvent, ChannelKey, EventBus, EventBusError, EventStream};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::debug;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// In-memory event bus using tokio broadcast channels, one per [`ChannelKey`].
pub struct MemoryEventBus {
    channels: Arc<DashMap<ChannelKey, broadcast::Sender<ChangeEvent>>>,
    capacity: usize,
}

impl MemoryEventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Number of live listeners on a channel.
    pub fn subscriber_count(&self, key: &ChannelKey) -> usize {
        self.channels
            .get(key)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Get or create the broadcast channel for a key
    fn get_or_create_channel(&self, key: &ChannelKey) -> broadcast::Sender<ChangeEvent> {
        self.channels
            .entry(key.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for MemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for MemoryEventBus {
    async fn publish(&self, key: &ChannelKey, event: ChangeEvent) -> Result<(), EventBusError> {
        let tx = self.get_or_create_channel(key);

        // Ignore error if no receivers (this is fine)
        let _ = tx.send(event);

        Ok(())
    }

    async fn subscribe(&self, key: &ChannelKey) -> Result<EventStream, EventBusError> {
        let tx = self.get_or_create_channel(key);
        let rx = tx.subscribe();
        let collection = key.collection();
        let channel = key.clone();

        // A lagging receiver gets a single Resync marker in place of the
        // events it missed.
        let stream = BroadcastStream::new(rx).map(move |result| match result {
            Ok(event) => event,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                debug!(%channel, skipped, "event subscriber lagged");
                ChangeEvent::resync(collection)
            }
        });

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_events::{ChangeKind, CollectionKind};
    use cohort_storage::{CohortId, UserId};
    use futures::StreamExt;
    use std::time::Duration;

    fn added(collection: CollectionKind, doc_id: &str, timestamp: i64) -> ChangeEvent {
        ChangeEvent {
            collection,
            change: ChangeKind::Added,
            doc_id: doc_id.to_string(),
            timestamp,
        }
    }

    #[tokio::test]
    async fn publish_and_subscribe() {
        let bus = MemoryEventBus::new();
        let key = ChannelKey::new(CohortId::generate(), CollectionKind::Messages);

        // Subscribe first
        let mut stream = bus.subscribe(&key).await.unwrap();

        bus.publish(&key, added(CollectionKind::Messages, "m1", 1))
            .await
            .unwrap();

        let received = tokio::time::timeout(Duration::from_millis(100), stream.next())
            .await
            .expect("timeout")
            .expect("stream ended");

        assert_eq!(received.doc_id, "m1");
        assert_eq!(received.change, ChangeKind::Added);
    }

    #[tokio::test]
    async fn multiple_subscribers() {
        let bus = MemoryEventBus::new();
        let key = ChannelKey::new(CohortId::generate(), CollectionKind::Tasks);

        let mut stream1 = bus.subscribe(&key).await.unwrap();
        let mut stream2 = bus.subscribe(&key).await.unwrap();
        assert_eq!(bus.subscriber_count(&key), 2);

        bus.publish(&key, added(CollectionKind::Tasks, "t1", 2))
            .await
            .unwrap();

        // Both should receive
        let recv1 = stream1.next().await.unwrap();
        let recv2 = stream2.next().await.unwrap();

        assert_eq!(recv1.doc_id, "t1");
        assert_eq!(recv2.doc_id, "t1");
    }

    #[tokio::test]
    async fn publish_before_subscribe_is_lost() {
        let bus = MemoryEventBus::new();
        let key = ChannelKey::new(CohortId::generate(), CollectionKind::Messages);

        bus.publish(&key, added(CollectionKind::Messages, "old", 3))
            .await
            .unwrap();

        let mut stream = bus.subscribe(&key).await.unwrap();

        let result = tokio::time::timeout(Duration::from_millis(50), stream.next()).await;

        assert!(
            result.is_err(),
            "Should not receive event published before subscription"
        );
    }

    #[tokio::test]
    async fn cross_channel_isolation() {
        let bus = MemoryEventBus::new();
        let cohort_a = CohortId::generate();
        let cohort_b = CohortId::generate();
        let feed_a = ChannelKey::new(cohort_a, CollectionKind::Messages);

        let mut stream_a = bus.subscribe(&feed_a).await.unwrap();

        // Other cohort, and other collection of the same cohort: not delivered
        bus.publish(
            &ChannelKey::new(cohort_b, CollectionKind::Messages),
            added(CollectionKind::Messages, "other-cohort", 1),
        )
        .await
        .unwrap();
        bus.publish(
            &ChannelKey::new(cohort_a, CollectionKind::Tasks),
            added(CollectionKind::Tasks, "other-collection", 2),
        )
        .await
        .unwrap();
        bus.publish(&feed_a, added(CollectionKind::Messages, "mine", 3))
            .await
            .unwrap();

        let received = tokio::time::timeout(Duration::from_millis(100), stream_a.next())
            .await
            .expect("timeout")
            .expect("stream ended");

        assert_eq!(received.doc_id, "mine");
    }

    #[tokio::test]
    async fn dropping_stream_releases_listener() {
        let bus = MemoryEventBus::new();
        let key = ChannelKey::new(CohortId::generate(), CollectionKind::Cohort);

        let stream = bus.subscribe(&key).await.unwrap();
        assert_eq!(bus.subscriber_count(&key), 1);

        drop(stream);
        assert_eq!(bus.subscriber_count(&key), 0);
    }

    #[tokio::test]
    async fn lagged_subscriber_gets_resync() {
        let bus = MemoryEventBus::with_capacity(2);
        let key = ChannelKey::new(CohortId::generate(), CollectionKind::Messages);
        let mut stream = bus.subscribe(&key).await.unwrap();

        for i in 0..5 {
            bus.publish(&key, added(CollectionKind::Messages, &format!("m{i}"), i))
                .await
                .unwrap();
        }

        let first = stream.next().await.unwrap();
        assert_eq!(first.change, ChangeKind::Resync);
        assert_eq!(first.collection, CollectionKind::Messages);
    }

    #[tokio::test]
    async fn directory_channel_is_separate_from_cohort_channels() {
        let bus = MemoryEventBus::new();
        let cohort_id = CohortId::generate();
        let directory = ChannelKey::directory(UserId::from("alice"));
        let mut stream = bus.subscribe(&directory).await.unwrap();

        bus.publish(
            &ChannelKey::new(cohort_id, CollectionKind::Cohort),
            added(CollectionKind::Cohort, "cohort-doc", 1),
        )
        .await
        .unwrap();
        bus.publish(&directory, added(CollectionKind::Cohort, "joined", 2))
            .await
            .unwrap();

        let received = tokio::time::timeout(Duration::from_millis(100), stream.next())
            .await
            .expect("timeout")
            .expect("stream ended");
        assert_eq!(received.doc_id, "joined");
    }

    #[test]
    fn memory_event_bus_default() {
        let bus = MemoryEventBus::default();
        assert!(bus.channels.is_empty());
        assert_eq!(bus.capacity, DEFAULT_CHANNEL_CAPACITY);
    }

    #[tokio::test]
    async fn multiple_events_ordering() {
        let bus = MemoryEventBus::new();
        let key = ChannelKey::new(CohortId::generate(), CollectionKind::Messages);

        let mut stream = bus.subscribe(&key).await.unwrap();

        for i in 1i64..=3 {
            bus.publish(&key, added(CollectionKind::Messages, &format!("m{i}"), i))
                .await
                .unwrap();
        }

        let recv1 = stream.next().await.unwrap();
        let recv2 = stream.next().await.unwrap();
        let recv3 = stream.next().await.unwrap();

        assert_eq!(recv1.doc_id, "m1");
        assert_eq!(recv2.doc_id, "m2");
        assert_eq!(recv3.doc_id, "m3");
    }
}
