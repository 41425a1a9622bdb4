//! Shared checklist types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CohortId, TaskId, UserId};

/// Checklist item. `is_completed` may be flipped by any member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub cohort_id: CohortId,
    pub text: String,
    pub is_completed: bool,
    pub creator_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating a task (always starts incomplete)
#[derive(Clone, Debug)]
pub struct NewTask {
    pub text: String,
    pub creator_id: UserId,
}
