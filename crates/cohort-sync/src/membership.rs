//! Membership ledger: the cohort document's member set.

use crate::access::WriteContext;
use crate::engine::{Guard, SyncEngine, SyncedCollection, WriteIntent};
use crate::error::SyncError;
use async_trait::async_trait;
use cohort_events::CollectionKind;
use cohort_storage::{Cohort, CohortId, Store, StoreError, UserId};

pub fn is_member(cohort: &Cohort, user_id: &UserId) -> bool {
    cohort.has_member(user_id)
}

/// The cohort document itself, synced as a one-item collection.
#[derive(Clone, Copy, Debug, Default)]
pub struct CohortDocument;

#[async_trait]
impl SyncedCollection for CohortDocument {
    type Item = Cohort;

    fn kind(&self) -> CollectionKind {
        CollectionKind::Cohort
    }

    async fn load(&self, store: &dyn Store, cohort_id: &CohortId) -> Result<Vec<Cohort>, StoreError> {
        Ok(vec![store.get_cohort(cohort_id).await?])
    }
}

/// Set-add of one identity to the member set.
pub struct JoinMember {
    pub user_id: UserId,
}

#[async_trait]
impl WriteIntent for JoinMember {
    /// `true` if the member set grew.
    type Output = bool;

    fn label(&self) -> &'static str {
        "join"
    }

    async fn apply(
        &self,
        store: &dyn Store,
        cohort_id: &CohortId,
        guard: &Guard<'_>,
    ) -> Result<bool, SyncError> {
        guard()?;
        Ok(store.add_member(cohort_id, &self.user_id).await?)
    }
}

/// Join the cohort in `ctx` as its identity.
///
/// Already being a member is a no-op that succeeds even after the cohort
/// has ended. Returns `true` if the identity was added.
pub async fn join(engine: &SyncEngine, ctx: &WriteContext<'_>) -> Result<bool, SyncError> {
    let identity = ctx.identity()?;
    if is_member(ctx.cohort, &identity.id) {
        return Ok(false);
    }
    ctx.ensure_active()?;

    let gate = ctx.gate();
    engine
        .dispatch(
            ctx.cohort.id,
            &JoinMember {
                user_id: identity.id.clone(),
            },
            &gate,
        )
        .await
}
