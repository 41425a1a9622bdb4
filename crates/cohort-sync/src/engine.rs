//! The sync engine.
//!
//! Reads: one subscription per collection kind, each turning the bus channel
//! for (cohort, collection) into a stream of full snapshots. The first
//! snapshot is produced on first poll from a cold read; afterwards every
//! change event triggers exactly one re-read and one snapshot.
//!
//! Writes: a [`WriteIntent`] is applied against the store with a gate check
//! passed in by the caller, to be run right before the store write.

use crate::error::SyncError;
use crate::subscription::{Release, Snapshot, SnapshotStream, Subscription};
use async_trait::async_trait;
use cohort_events::{ChannelKey, CollectionKind, EventBus, EventStream};
use cohort_storage::{CohortId, Store, StoreError};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Check run immediately before a store write.
pub type Guard<'a> = dyn Fn() -> Result<(), SyncError> + Send + Sync + 'a;

/// A collection that can be read as a whole and kept in sync.
#[async_trait]
pub trait SyncedCollection: Copy + Send + Sync + 'static {
    type Item: Clone + Send + 'static;

    fn kind(&self) -> CollectionKind;

    async fn load(
        &self,
        store: &dyn Store,
        cohort_id: &CohortId,
    ) -> Result<Vec<Self::Item>, StoreError>;
}

/// A local write to be applied through the store.
#[async_trait]
pub trait WriteIntent: Send + Sync {
    type Output: Send;

    fn label(&self) -> &'static str;

    async fn apply(
        &self,
        store: &dyn Store,
        cohort_id: &CohortId,
        guard: &Guard<'_>,
    ) -> Result<Self::Output, SyncError>;
}

struct ActiveSubscription {
    cohort_id: CohortId,
    handle: Arc<dyn Release>,
}

pub struct SyncEngine {
    store: Arc<dyn Store>,
    events: Arc<dyn EventBus>,
    active: Mutex<HashMap<CollectionKind, ActiveSubscription>>,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn Store>, events: Arc<dyn EventBus>) -> Self {
        Self {
            store,
            events,
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub(crate) fn events(&self) -> &Arc<dyn EventBus> {
        &self.events
    }

    /// Open the subscription for `collection` of `cohort_id`.
    ///
    /// At most one subscription per collection kind is active per engine:
    /// any previous one is released before the new listener is registered.
    pub async fn subscribe<C: SyncedCollection>(
        &self,
        cohort_id: CohortId,
        collection: C,
    ) -> Result<Subscription<C::Item>, SyncError> {
        let kind = collection.kind();
        self.release(kind);

        let key = ChannelKey::new(cohort_id, kind);
        let events = self.events.subscribe(&key).await.map_err(|e| {
            warn!(%cohort_id, %kind, "subscribe failed: {}", e);
            SyncError::from(e)
        })?;
        debug!(%cohort_id, %kind, "subscribed");

        let source = CollectionSource {
            store: self.store.clone(),
            key,
            cohort_id,
            collection,
        };
        let subscription = Subscription::new(snapshot_stream(source, events));
        let previous = self.lock_active().insert(
            kind,
            ActiveSubscription {
                cohort_id,
                handle: subscription.handle(),
            },
        );
        // A concurrent subscribe for the same kind may have slipped in.
        if let Some(previous) = previous {
            previous.handle.release();
        }
        Ok(subscription)
    }

    /// Release the active subscription for `kind`. Returns `false` if none.
    pub fn release(&self, kind: CollectionKind) -> bool {
        let previous = self.lock_active().remove(&kind);
        match previous {
            Some(previous) => {
                debug!(cohort_id = %previous.cohort_id, %kind, "releasing subscription");
                previous.handle.release();
                true
            }
            None => false,
        }
    }

    pub fn release_all(&self) {
        let drained: Vec<_> = self.lock_active().drain().collect();
        for (kind, previous) in drained {
            debug!(cohort_id = %previous.cohort_id, %kind, "releasing subscription");
            previous.handle.release();
        }
    }

    /// Cohort the active subscription for `kind` belongs to.
    pub fn active_cohort(&self, kind: CollectionKind) -> Option<CohortId> {
        self.lock_active().get(&kind).map(|active| active.cohort_id)
    }

    pub async fn dispatch<W: WriteIntent>(
        &self,
        cohort_id: CohortId,
        intent: &W,
        guard: &Guard<'_>,
    ) -> Result<W::Output, SyncError> {
        let result = intent.apply(&*self.store, &cohort_id, guard).await;
        match &result {
            Ok(_) => info!(%cohort_id, write = intent.label(), "write accepted"),
            Err(e) => debug!(%cohort_id, write = intent.label(), "write failed: {}", e),
        }
        result
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, HashMap<CollectionKind, ActiveSubscription>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// What a snapshot stream re-reads on every change event of its channel.
#[async_trait]
pub(crate) trait SnapshotSource: Send + Sync + 'static {
    type Item: Send + 'static;

    fn channel(&self) -> &ChannelKey;

    async fn load(&self) -> Result<Vec<Self::Item>, StoreError>;
}

struct CollectionSource<C> {
    store: Arc<dyn Store>,
    key: ChannelKey,
    cohort_id: CohortId,
    collection: C,
}

#[async_trait]
impl<C: SyncedCollection> SnapshotSource for CollectionSource<C> {
    type Item = C::Item;

    fn channel(&self) -> &ChannelKey {
        &self.key
    }

    async fn load(&self) -> Result<Vec<C::Item>, StoreError> {
        self.collection.load(&*self.store, &self.cohort_id).await
    }
}

struct FeedState<S> {
    source: S,
    events: EventStream,
    seq: u64,
    primed: bool,
}

pub(crate) fn snapshot_stream<S: SnapshotSource>(
    source: S,
    events: EventStream,
) -> SnapshotStream<S::Item> {
    let state = FeedState {
        source,
        events,
        seq: 0,
        primed: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.primed {
            let event = state.events.next().await?;
            debug!(
                channel = %state.source.channel(),
                change = ?event.change,
                doc_id = %event.doc_id,
                "change received"
            );
        }
        state.primed = true;

        let item = match state.source.load().await {
            Ok(items) => {
                state.seq += 1;
                Ok(Snapshot {
                    seq: state.seq,
                    items,
                })
            }
            Err(e) => {
                warn!(channel = %state.source.channel(), "snapshot read failed: {}", e);
                Err(SyncError::from(e))
            }
        };
        Some((item, state))
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_events::ChangeEvent;
    use cohort_events_memory::MemoryEventBus;
    use cohort_storage::{CreateCohortParams, UserId};
    use cohort_store_memory::MemoryStore;

    #[derive(Clone, Copy)]
    struct MemberIds;

    #[async_trait]
    impl SyncedCollection for MemberIds {
        type Item = UserId;

        fn kind(&self) -> CollectionKind {
            CollectionKind::Cohort
        }

        async fn load(
            &self,
            store: &dyn Store,
            cohort_id: &CohortId,
        ) -> Result<Vec<UserId>, StoreError> {
            Ok(store.get_cohort(cohort_id).await?.members)
        }
    }

    async fn fixture() -> (SyncEngine, Arc<MemoryStore>, Arc<MemoryEventBus>, CohortId) {
        let bus = Arc::new(MemoryEventBus::new());
        let store = Arc::new(MemoryStore::new(bus.clone()));
        let cohort = store
            .create_cohort(&CreateCohortParams {
                name: "Lift".to_string(),
                goal: "Deadlift 2x bodyweight".to_string(),
                ends_at: chrono::Utc::now() + chrono::Duration::days(10),
                creator_id: UserId::from("alice"),
            })
            .await
            .unwrap();
        (
            SyncEngine::new(store.clone(), bus.clone()),
            store,
            bus,
            cohort.id,
        )
    }

    #[tokio::test]
    async fn cold_start_then_one_snapshot_per_change() {
        let (engine, store, _, id) = fixture().await;
        let mut sub = engine.subscribe(id, MemberIds).await.unwrap();

        let first = sub.next().await.unwrap().unwrap();
        assert_eq!(first.seq, 1);
        assert_eq!(first.items, vec![UserId::from("alice")]);

        store.add_member(&id, &UserId::from("bob")).await.unwrap();
        let second = sub.next().await.unwrap().unwrap();
        assert_eq!(second.seq, 2);
        assert_eq!(second.items.len(), 2);
    }

    #[tokio::test]
    async fn resync_event_triggers_reload() {
        let (engine, _, bus, id) = fixture().await;
        let mut sub = engine.subscribe(id, MemberIds).await.unwrap();
        sub.next().await.unwrap().unwrap();

        bus.publish(
            &ChannelKey::new(id, CollectionKind::Cohort),
            ChangeEvent::resync(CollectionKind::Cohort),
        )
        .await
        .unwrap();
        let again = sub.next().await.unwrap().unwrap();
        assert_eq!(again.seq, 2);
        assert_eq!(
            bus.subscriber_count(&ChannelKey::new(id, CollectionKind::Cohort)),
            1
        );
    }

    #[tokio::test]
    async fn resubscribe_releases_previous_listener() {
        let (engine, _, bus, id) = fixture().await;
        let key = ChannelKey::new(id, CollectionKind::Cohort);

        let first = engine.subscribe(id, MemberIds).await.unwrap();
        assert_eq!(bus.subscriber_count(&key), 1);

        let _second = engine.subscribe(id, MemberIds).await.unwrap();
        assert!(first.is_cancelled());
        assert_eq!(bus.subscriber_count(&key), 1);
        assert_eq!(engine.active_cohort(CollectionKind::Cohort), Some(id));

        assert!(engine.release(CollectionKind::Cohort));
        assert!(!engine.release(CollectionKind::Cohort));
        assert_eq!(bus.subscriber_count(&key), 0);
        assert_eq!(engine.active_cohort(CollectionKind::Cohort), None);
    }
}
