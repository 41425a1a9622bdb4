//! Creating cohorts and listing the ones a user belongs to.

use crate::engine::{snapshot_stream, SnapshotSource, SyncEngine};
use crate::error::SyncError;
use crate::gate::{Clock, GateState};
use crate::identity::Identity;
use crate::subscription::{Snapshot, Subscription};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cohort_events::ChannelKey;
use cohort_storage::{
    Cohort, CreateCohortParams, Store, StoreError, UserId, MAX_COHORT_GOAL_CHARS,
    MAX_COHORT_NAME_CHARS,
};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct NewCohort {
    pub name: String,
    pub goal: String,
    pub ends_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CohortListing {
    pub cohort: Cohort,
    pub gate: GateState,
}

/// Create a cohort with the identity as creator and sole member.
pub async fn create_cohort(
    store: &dyn Store,
    identity: Option<&Identity>,
    clock: &dyn Clock,
    params: NewCohort,
) -> Result<Cohort, SyncError> {
    let creator = identity.ok_or(SyncError::Unauthenticated)?;

    let name = params.name.trim();
    let goal = params.goal.trim();
    if name.is_empty() || goal.is_empty() {
        return Err(SyncError::Empty);
    }
    if name.chars().count() > MAX_COHORT_NAME_CHARS {
        return Err(SyncError::Invalid(format!(
            "name must be at most {MAX_COHORT_NAME_CHARS} characters"
        )));
    }
    if goal.chars().count() > MAX_COHORT_GOAL_CHARS {
        return Err(SyncError::Invalid(format!(
            "goal must be at most {MAX_COHORT_GOAL_CHARS} characters"
        )));
    }
    if params.ends_at <= clock.now() {
        return Err(SyncError::Invalid("end date must be in the future".to_string()));
    }

    let cohort = store
        .create_cohort(&CreateCohortParams {
            name: name.to_string(),
            goal: goal.to_string(),
            ends_at: params.ends_at,
            creator_id: creator.id.clone(),
        })
        .await?;
    info!(cohort_id = %cohort.id, creator = %creator.id, "cohort created");
    Ok(cohort)
}

/// Cohorts the identity belongs to, soonest-ending first. Guests get none.
pub async fn list_my_cohorts(
    store: &dyn Store,
    identity: Option<&Identity>,
    clock: &dyn Clock,
) -> Result<Vec<CohortListing>, SyncError> {
    let Some(identity) = identity else {
        return Ok(Vec::new());
    };
    let cohorts = store.list_cohorts_for_member(&identity.id).await?;
    Ok(listings(cohorts, clock.now()))
}

/// Live version of [`list_my_cohorts`].
///
/// The first snapshot is a cold read; every change on the identity's
/// directory channel (a cohort created, a member joining one of its cohorts)
/// triggers one re-read. The caller owns the subscription, and dropping it
/// releases the listener. Guests get a single empty snapshot.
pub async fn watch_my_cohorts(
    engine: &SyncEngine,
    identity: Option<&Identity>,
    clock: Arc<dyn Clock>,
) -> Result<Subscription<CohortListing>, SyncError> {
    let Some(identity) = identity else {
        let empty = stream::once(async {
            Ok::<_, SyncError>(Snapshot {
                seq: 1,
                items: Vec::new(),
            })
        })
        .chain(stream::pending());
        return Ok(Subscription::new(empty.boxed()));
    };

    let key = ChannelKey::directory(identity.id.clone());
    let events = engine.events().subscribe(&key).await.map_err(|e| {
        warn!(channel = %key, "subscribe failed: {}", e);
        SyncError::from(e)
    })?;
    debug!(channel = %key, "subscribed");

    let source = MyCohorts {
        store: engine.store().clone(),
        key,
        user_id: identity.id.clone(),
        clock,
    };
    Ok(Subscription::new(snapshot_stream(source, events)))
}

struct MyCohorts {
    store: Arc<dyn Store>,
    key: ChannelKey,
    user_id: UserId,
    clock: Arc<dyn Clock>,
}

#[async_trait]
impl SnapshotSource for MyCohorts {
    type Item = CohortListing;

    fn channel(&self) -> &ChannelKey {
        &self.key
    }

    async fn load(&self) -> Result<Vec<CohortListing>, StoreError> {
        let cohorts = self.store.list_cohorts_for_member(&self.user_id).await?;
        Ok(listings(cohorts, self.clock.now()))
    }
}

fn listings(cohorts: Vec<Cohort>, now: DateTime<Utc>) -> Vec<CohortListing> {
    cohorts
        .into_iter()
        .map(|cohort| CohortListing {
            gate: GateState::at(&cohort, now),
            cohort,
        })
        .collect()
}
