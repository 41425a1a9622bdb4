//! The Store trait that backends implement.

use crate::types::*;
use crate::StoreError;

/// The storage trait the sync engine depends on.
///
/// All message and task methods are **scoped by cohort**. Writes that several
/// members may issue concurrently (`add_member`, `set_task_completed`) must be
/// atomic per document: backends implement them as set-add / single-field
/// writes, never as read-modify-write of the whole document.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // ───────────────────────────────────── Users ──────────────────────────────────────────

    /// Create a user profile unless one already exists. Returns `true` if created.
    async fn create_user_if_absent(&self, params: &CreateUserParams) -> Result<bool, StoreError>;

    /// Get a user profile by ID.
    async fn get_user(&self, user_id: &UserId) -> Result<UserProfile, StoreError>;

    // ───────────────────────────────────── Cohorts ────────────────────────────────────────

    /// Create a cohort (returns the stored document with its generated ID).
    async fn create_cohort(&self, params: &CreateCohortParams) -> Result<Cohort, StoreError>;

    /// Get cohort by ID.
    async fn get_cohort(&self, cohort_id: &CohortId) -> Result<Cohort, StoreError>;

    /// List all cohorts the user is a member of, ordered by end time ascending.
    async fn list_cohorts_for_member(&self, user_id: &UserId) -> Result<Vec<Cohort>, StoreError>;

    /// Atomically add a user to a cohort's member set.
    /// Returns `false` when the user was already a member.
    async fn add_member(&self, cohort_id: &CohortId, user_id: &UserId)
        -> Result<bool, StoreError>;

    // ───────────────────────────────────── Messages ───────────────────────────────────────

    /// Append a message; the store assigns its ID and timestamp.
    async fn append_message(
        &self,
        cohort_id: &CohortId,
        params: &NewMessage,
    ) -> Result<Message, StoreError>;

    /// List all messages in a cohort ordered by (timestamp, id) ascending.
    async fn list_messages(&self, cohort_id: &CohortId) -> Result<Vec<Message>, StoreError>;

    // ───────────────────────────────────── Tasks ──────────────────────────────────────────

    /// Create a task (incomplete); the store assigns its ID.
    async fn create_task(&self, cohort_id: &CohortId, params: &NewTask)
        -> Result<Task, StoreError>;

    /// Get a task by ID.
    async fn get_task(&self, cohort_id: &CohortId, task_id: &TaskId) -> Result<Task, StoreError>;

    /// Write the completion flag of a task.
    async fn set_task_completed(
        &self,
        cohort_id: &CohortId,
        task_id: &TaskId,
        is_completed: bool,
    ) -> Result<(), StoreError>;

    /// List all tasks in a cohort in creation order.
    async fn list_tasks(&self, cohort_id: &CohortId) -> Result<Vec<Task>, StoreError>;
}
