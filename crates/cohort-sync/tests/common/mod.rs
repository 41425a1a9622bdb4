#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use cohort_config::SyncConfig;
use cohort_events::{ChannelKey, CollectionKind};
use cohort_events_memory::MemoryEventBus;
use cohort_storage::{Cohort, CohortId, CreateCohortParams, Store, UserId};
use cohort_store_memory::MemoryStore;
use cohort_sync::{
    Clock, CohortSession, Identity, ManualClock, MemoryIdentityProvider, SyncEngine,
};
use std::sync::Arc;

pub fn end_of_cohort() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap()
}

pub fn alice() -> Identity {
    Identity::new("alice", "Alice")
}

pub fn bob() -> Identity {
    Identity::new("bob", "Bob")
}

pub fn mallory() -> Identity {
    Identity::new("mallory", "Mallory")
}

/// In-memory store and bus sharing one manual clock.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub bus: Arc<MemoryEventBus>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::at(end_of_cohort() - Duration::days(1))
    }

    pub fn at(now: DateTime<Utc>) -> Self {
        let bus = Arc::new(MemoryEventBus::new());
        Self {
            store: Arc::new(MemoryStore::new(bus.clone())),
            bus,
            clock: Arc::new(ManualClock::new(now)),
        }
    }

    /// A cohort created by `creator`, ending at [`end_of_cohort`].
    pub async fn cohort(&self, creator: &Identity) -> Cohort {
        self.store
            .create_cohort(&CreateCohortParams {
                name: "January sprint".to_string(),
                goal: "Ship the beta".to_string(),
                ends_at: end_of_cohort(),
                creator_id: creator.id.clone(),
            })
            .await
            .unwrap()
    }

    pub async fn add_member(&self, cohort: &Cohort, who: &Identity) {
        self.store.add_member(&cohort.id, &who.id).await.unwrap();
    }

    pub fn session(&self, identity: Option<Identity>) -> CohortSession {
        let provider = match identity {
            Some(identity) => MemoryIdentityProvider::signed_in(identity),
            None => MemoryIdentityProvider::guest(),
        };
        let clock: Arc<dyn Clock> = self.clock.clone();
        CohortSession::new(
            SyncEngine::new(self.store.clone(), self.bus.clone()),
            Arc::new(provider),
            clock,
            SyncConfig::default(),
        )
    }

    /// A session for `identity`, activated on `cohort` with initial snapshots applied.
    pub async fn live_session(&self, identity: Option<Identity>, cohort: &Cohort) -> CohortSession {
        let mut session = self.session(identity);
        session.activate(cohort.id).await.unwrap();
        session.await_initial_snapshots().await.unwrap();
        session
    }

    pub fn listeners(&self, cohort_id: CohortId) -> usize {
        [
            CollectionKind::Cohort,
            CollectionKind::Messages,
            CollectionKind::Tasks,
        ]
        .iter()
        .map(|kind| self.bus.subscriber_count(&ChannelKey::new(cohort_id, *kind)))
        .sum()
    }
}

pub fn user(id: &str) -> UserId {
    UserId::from(id)
}
