//! Cohort document types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CohortId, UserId};

/// Maximum cohort name length, in characters.
pub const MAX_COHORT_NAME_CHARS: usize = 100;

/// Maximum goal description length, in characters.
pub const MAX_COHORT_GOAL_CHARS: usize = 500;

/// Cohort document.
///
/// `members` has set semantics (no duplicates) and keeps join order. It only
/// ever grows: there is no removal path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cohort {
    pub id: CohortId,
    pub name: String,
    pub goal: String,
    pub ends_at: DateTime<Utc>,
    pub creator_id: UserId,
    pub members: Vec<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Cohort {
    pub fn has_member(&self, user_id: &UserId) -> bool {
        self.members.iter().any(|member| member == user_id)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

/// Parameters for creating a cohort. The creator becomes the first member.
#[derive(Clone, Debug)]
pub struct CreateCohortParams {
    pub name: String,
    pub goal: String,
    pub ends_at: DateTime<Utc>,
    pub creator_id: UserId,
}
