use cohort_events::EventBusError;
use cohort_storage::StoreError;
use thiserror::Error;

/// Errors surfaced by the sync engine and cohort session.
///
/// None of these is fatal: callers recover at the session boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("sign in to continue")]
    Unauthenticated,
    #[error("not a member of this cohort")]
    NotMember,
    #[error("cohort has ended")]
    CohortExpired,
    #[error("cohort not found")]
    NotFound,
    #[error("text is empty")]
    Empty,
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error("sync unavailable: {0}")]
    SyncUnavailable(String),
}

impl SyncError {
    /// Errors decided before any I/O, without touching the store.
    pub fn is_gating(&self) -> bool {
        matches!(
            self,
            SyncError::Unauthenticated
                | SyncError::NotMember
                | SyncError::CohortExpired
                | SyncError::Empty
                | SyncError::Invalid(_)
        )
    }
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => SyncError::NotFound,
            other => SyncError::SyncUnavailable(other.to_string()),
        }
    }
}

impl From<EventBusError> for SyncError {
    fn from(e: EventBusError) -> Self {
        SyncError::SyncUnavailable(e.to_string())
    }
}
