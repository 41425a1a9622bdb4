//! Event bus abstraction for cohort change notifications.
//!
//! Store backends publish one [`ChangeEvent`] per committed write, on the
//! channel of the (cohort, collection) pair the write touched. Writes that
//! change which cohorts a user belongs to, or what those cohorts look like,
//! are also published on each affected member's directory channel. The sync
//! engine subscribes per channel and turns each event into a fresh snapshot.

use async_trait::async_trait;
use cohort_storage::{CohortId, UserId};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use thiserror::Error;

/// Which part of a cohort a change touched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    /// The cohort document itself (name, end time, member set).
    Cohort,
    Messages,
    Tasks,
}

impl std::fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CollectionKind::Cohort => "cohort",
            CollectionKind::Messages => "messages",
            CollectionKind::Tasks => "tasks",
        };
        f.write_str(s)
    }
}

/// Type of document change
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Added,
    Modified,
    /// Some notifications were lost; subscribers must re-read the collection.
    Resync,
}

/// Event representing a change in one of a cohort's collections
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub collection: CollectionKind,
    pub change: ChangeKind,
    /// ID of the changed document (empty for `Resync`).
    pub doc_id: String,
    /// Unix milliseconds of the write, as assigned by the store.
    pub timestamp: i64,
}

impl ChangeEvent {
    pub fn resync(collection: CollectionKind) -> Self {
        Self {
            collection,
            change: ChangeKind::Resync,
            doc_id: String::new(),
            timestamp: 0,
        }
    }
}

/// Channel address.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChannelKey {
    /// One collection of one cohort.
    Cohort {
        cohort_id: CohortId,
        collection: CollectionKind,
    },
    /// The set of cohorts a user belongs to.
    Directory(UserId),
}

impl ChannelKey {
    pub fn new(cohort_id: CohortId, collection: CollectionKind) -> Self {
        Self::Cohort {
            cohort_id,
            collection,
        }
    }

    pub fn directory(user_id: UserId) -> Self {
        Self::Directory(user_id)
    }

    /// Collection whose documents travel on this channel.
    pub fn collection(&self) -> CollectionKind {
        match self {
            Self::Cohort { collection, .. } => *collection,
            Self::Directory(_) => CollectionKind::Cohort,
        }
    }
}

impl std::fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cohort {
                cohort_id,
                collection,
            } => write!(f, "cohort/{cohort_id}/{collection}"),
            Self::Directory(user_id) => write!(f, "directory/{user_id}"),
        }
    }
}

/// Error type for event bus operations
#[derive(Debug, Error)]
pub enum EventBusError {
    #[error("backend error: {0}")]
    Backend(String),
}

/// Stream of change events
pub type EventStream = Pin<Box<dyn Stream<Item = ChangeEvent> + Send>>;

/// Event bus trait for publishing and subscribing to cohort change events.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish a change event to all watchers of this channel.
    ///
    /// Called by store backends after a write has been committed.
    async fn publish(&self, key: &ChannelKey, event: ChangeEvent) -> Result<(), EventBusError>;

    /// Subscribe to change events for a channel.
    ///
    /// Returns a stream that yields events as they occur.
    /// The stream will continue until dropped; dropping it releases the listener.
    async fn subscribe(&self, key: &ChannelKey) -> Result<EventStream, EventBusError>;
}
