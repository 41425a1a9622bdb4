//! Shared checklist. Any member may flip any task.

use crate::access::{normalize_text, WriteContext};
use crate::engine::{Guard, SyncEngine, SyncedCollection, WriteIntent};
use crate::error::SyncError;
use async_trait::async_trait;
use cohort_events::CollectionKind;
use cohort_storage::{CohortId, NewTask, Store, StoreError, Task, TaskId, UserId};

/// Tasks in creation order.
#[derive(Clone, Copy, Debug, Default)]
pub struct TaskList;

#[async_trait]
impl SyncedCollection for TaskList {
    type Item = Task;

    fn kind(&self) -> CollectionKind {
        CollectionKind::Tasks
    }

    async fn load(&self, store: &dyn Store, cohort_id: &CohortId) -> Result<Vec<Task>, StoreError> {
        store.list_tasks(cohort_id).await
    }
}

pub struct CreateTask {
    pub text: String,
    pub creator_id: UserId,
}

#[async_trait]
impl WriteIntent for CreateTask {
    type Output = Task;

    fn label(&self) -> &'static str {
        "add_task"
    }

    async fn apply(
        &self,
        store: &dyn Store,
        cohort_id: &CohortId,
        guard: &Guard<'_>,
    ) -> Result<Task, SyncError> {
        guard()?;
        let task = store
            .create_task(
                cohort_id,
                &NewTask {
                    text: self.text.clone(),
                    creator_id: self.creator_id.clone(),
                },
            )
            .await?;
        Ok(task)
    }
}

/// Flip the stored completion flag. The current value is read from the
/// store, not from any local snapshot.
pub struct FlipTask {
    pub task_id: TaskId,
}

#[async_trait]
impl WriteIntent for FlipTask {
    /// The completion flag after the flip.
    type Output = bool;

    fn label(&self) -> &'static str {
        "toggle_task"
    }

    async fn apply(
        &self,
        store: &dyn Store,
        cohort_id: &CohortId,
        guard: &Guard<'_>,
    ) -> Result<bool, SyncError> {
        let current = store.get_task(cohort_id, &self.task_id).await?;
        guard()?;
        let flipped = !current.is_completed;
        store
            .set_task_completed(cohort_id, &self.task_id, flipped)
            .await?;
        Ok(flipped)
    }
}

pub async fn add_task(
    engine: &SyncEngine,
    ctx: &WriteContext<'_>,
    text: &str,
) -> Result<Task, SyncError> {
    let author = ctx.identity()?;
    let text = normalize_text(text)?;
    ctx.ensure_member(author)?;
    ctx.ensure_active()?;

    let gate = ctx.gate();
    let intent = CreateTask {
        text,
        creator_id: author.id.clone(),
    };
    engine.dispatch(ctx.cohort.id, &intent, &gate).await
}

pub async fn toggle_task(
    engine: &SyncEngine,
    ctx: &WriteContext<'_>,
    task_id: TaskId,
) -> Result<bool, SyncError> {
    let user = ctx.identity()?;
    ctx.ensure_member(user)?;
    ctx.ensure_active()?;

    let gate = ctx.gate();
    engine
        .dispatch(ctx.cohort.id, &FlipTask { task_id }, &gate)
        .await
}
