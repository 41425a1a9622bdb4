//! Sync and access-control engine for time-bound cohorts.
//!
//! A [`CohortSession`] binds one cohort id and the signed-in identity to three
//! live snapshot streams (cohort document, message feed, checklist) opened
//! through the [`SyncEngine`]. Every write goes through the session, which
//! checks membership and the clock gate before handing the write to the
//! engine, and the gate is checked once more right before the store call.

pub mod access;
pub mod checklist;
pub mod countdown;
pub mod directory;
pub mod engine;
pub mod error;
pub mod feed;
pub mod gate;
pub mod identity;
pub mod membership;
pub mod session;
pub mod share;
pub mod subscription;

pub use access::{normalize_text, WriteContext};
pub use checklist::{CreateTask, FlipTask, TaskList};
pub use countdown::countdown;
pub use directory::{create_cohort, list_my_cohorts, watch_my_cohorts, CohortListing, NewCohort};
pub use engine::{Guard, SyncEngine, SyncedCollection, WriteIntent};
pub use error::SyncError;
pub use feed::{MessageLog, PostMessage};
pub use gate::{
    is_expired, remaining, remaining_until, Clock, GateState, ManualClock, Remaining, SystemClock,
};
pub use identity::{
    sign_in, FileIdentityProvider, Identity, IdentityProvider, MemoryIdentityProvider,
};
pub use membership::{is_member, CohortDocument, JoinMember};
pub use session::{CohortSession, CohortView, SessionStatus, SessionUpdate};
pub use share::{join_url, share_text};
pub use subscription::{Snapshot, SnapshotStream, Subscription};
