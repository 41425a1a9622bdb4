//! Chat message types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CohortId, MessageId, UserId};

/// Message record. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub cohort_id: CohortId,
    pub text: String,
    pub sender_id: UserId,
    /// Display name captured at send time.
    pub sender_name: String,
    /// Server-assigned write time.
    pub timestamp: DateTime<Utc>,
}

/// Parameters for appending a message (id and timestamp come from the store).
#[derive(Clone, Debug)]
pub struct NewMessage {
    pub text: String,
    pub sender_id: UserId,
    pub sender_name: String,
}
