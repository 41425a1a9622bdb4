//! User profile types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

/// User profile record, written once on first sign-in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub display_name: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating a user profile
#[derive(Clone, Debug)]
pub struct CreateUserParams {
    pub id: UserId,
    pub display_name: String,
    pub email: Option<String>,
}
