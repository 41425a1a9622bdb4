//! In-memory document store.
//!
//! Every cohort lives in one `DashMap` entry together with its `messages` and
//! `tasks` sub-collections. All mutations of a cohort happen under that entry's
//! lock, which gives the per-document atomicity the [`Store`] contract asks for.
//! Change events are published after the lock is released. Creating a cohort
//! or adding a member also notifies the directory channel of every member.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cohort_events::{ChangeEvent, ChangeKind, ChannelKey, CollectionKind, EventBus};
use cohort_storage::{
    Cohort, CohortId, CreateCohortParams, CreateUserParams, Message, MessageId, NewMessage,
    NewTask, Store, StoreError, Task, TaskId, UserId, UserProfile,
};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::warn;

struct CohortDoc {
    cohort: Cohort,
    messages: Vec<Message>,
    tasks: Vec<Task>,
    /// Last timestamp handed out for this cohort; keeps server time non-decreasing.
    last_timestamp: DateTime<Utc>,
}

impl CohortDoc {
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now().max(self.last_timestamp);
        self.last_timestamp = now;
        now
    }
}

pub struct MemoryStore {
    cohorts: DashMap<CohortId, CohortDoc>,
    users: DashMap<UserId, UserProfile>,
    events: Arc<dyn EventBus>,
}

impl MemoryStore {
    pub fn new(events: Arc<dyn EventBus>) -> Self {
        Self {
            cohorts: DashMap::new(),
            users: DashMap::new(),
            events,
        }
    }

    async fn notify(
        &self,
        cohort_id: CohortId,
        collection: CollectionKind,
        change: ChangeKind,
        doc_id: String,
        at: DateTime<Utc>,
    ) {
        let event = ChangeEvent {
            collection,
            change,
            doc_id,
            timestamp: at.timestamp_millis(),
        };
        // The write is already committed; a failed notification only delays subscribers.
        if let Err(e) = self
            .events
            .publish(&ChannelKey::new(cohort_id, collection), event)
            .await
        {
            warn!(%cohort_id, %collection, "failed to publish change event: {}", e);
        }
    }

    async fn notify_directories(
        &self,
        members: &[UserId],
        cohort_id: CohortId,
        change: ChangeKind,
        at: DateTime<Utc>,
    ) {
        for user_id in members {
            let event = ChangeEvent {
                collection: CollectionKind::Cohort,
                change: change.clone(),
                doc_id: cohort_id.to_string(),
                timestamp: at.timestamp_millis(),
            };
            if let Err(e) = self
                .events
                .publish(&ChannelKey::directory(user_id.clone()), event)
                .await
            {
                warn!(%cohort_id, %user_id, "failed to publish directory event: {}", e);
            }
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user_if_absent(&self, params: &CreateUserParams) -> Result<bool, StoreError> {
        let mut created = false;
        self.users.entry(params.id.clone()).or_insert_with(|| {
            created = true;
            UserProfile {
                id: params.id.clone(),
                display_name: params.display_name.clone(),
                email: params.email.clone(),
                created_at: Utc::now(),
            }
        });
        Ok(created)
    }

    async fn get_user(&self, user_id: &UserId) -> Result<UserProfile, StoreError> {
        self.users
            .get(user_id)
            .map(|profile| profile.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn create_cohort(&self, params: &CreateCohortParams) -> Result<Cohort, StoreError> {
        let now = Utc::now();
        let cohort = Cohort {
            id: CohortId::generate(),
            name: params.name.clone(),
            goal: params.goal.clone(),
            ends_at: params.ends_at,
            creator_id: params.creator_id.clone(),
            members: vec![params.creator_id.clone()],
            created_at: now,
        };
        self.cohorts.insert(
            cohort.id,
            CohortDoc {
                cohort: cohort.clone(),
                messages: Vec::new(),
                tasks: Vec::new(),
                last_timestamp: now,
            },
        );
        self.notify(
            cohort.id,
            CollectionKind::Cohort,
            ChangeKind::Added,
            cohort.id.to_string(),
            now,
        )
        .await;
        self.notify_directories(&cohort.members, cohort.id, ChangeKind::Added, now)
            .await;
        Ok(cohort)
    }

    async fn get_cohort(&self, cohort_id: &CohortId) -> Result<Cohort, StoreError> {
        self.cohorts
            .get(cohort_id)
            .map(|doc| doc.cohort.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn list_cohorts_for_member(&self, user_id: &UserId) -> Result<Vec<Cohort>, StoreError> {
        let mut cohorts: Vec<Cohort> = self
            .cohorts
            .iter()
            .filter(|doc| doc.cohort.has_member(user_id))
            .map(|doc| doc.cohort.clone())
            .collect();
        cohorts.sort_by(|a, b| a.ends_at.cmp(&b.ends_at).then(a.id.cmp(&b.id)));
        Ok(cohorts)
    }

    async fn add_member(
        &self,
        cohort_id: &CohortId,
        user_id: &UserId,
    ) -> Result<bool, StoreError> {
        let (members, now) = {
            let mut doc = self.cohorts.get_mut(cohort_id).ok_or(StoreError::NotFound)?;
            if doc.cohort.has_member(user_id) {
                return Ok(false);
            }
            doc.cohort.members.push(user_id.clone());
            let now = doc.next_timestamp();
            (doc.cohort.members.clone(), now)
        };
        self.notify(
            *cohort_id,
            CollectionKind::Cohort,
            ChangeKind::Modified,
            cohort_id.to_string(),
            now,
        )
        .await;
        self.notify_directories(&members, *cohort_id, ChangeKind::Modified, now)
            .await;
        Ok(true)
    }

    async fn append_message(
        &self,
        cohort_id: &CohortId,
        params: &NewMessage,
    ) -> Result<Message, StoreError> {
        let message = {
            let mut doc = self.cohorts.get_mut(cohort_id).ok_or(StoreError::NotFound)?;
            let message = Message {
                id: MessageId::generate(),
                cohort_id: *cohort_id,
                text: params.text.clone(),
                sender_id: params.sender_id.clone(),
                sender_name: params.sender_name.clone(),
                timestamp: doc.next_timestamp(),
            };
            doc.messages.push(message.clone());
            message
        };
        self.notify(
            *cohort_id,
            CollectionKind::Messages,
            ChangeKind::Added,
            message.id.to_string(),
            message.timestamp,
        )
        .await;
        Ok(message)
    }

    async fn list_messages(&self, cohort_id: &CohortId) -> Result<Vec<Message>, StoreError> {
        let mut messages = self
            .cohorts
            .get(cohort_id)
            .map(|doc| doc.messages.clone())
            .ok_or(StoreError::NotFound)?;
        messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(messages)
    }

    async fn create_task(
        &self,
        cohort_id: &CohortId,
        params: &NewTask,
    ) -> Result<Task, StoreError> {
        let task = {
            let mut doc = self.cohorts.get_mut(cohort_id).ok_or(StoreError::NotFound)?;
            let task = Task {
                id: TaskId::generate(),
                cohort_id: *cohort_id,
                text: params.text.clone(),
                is_completed: false,
                creator_id: params.creator_id.clone(),
                created_at: doc.next_timestamp(),
            };
            doc.tasks.push(task.clone());
            task
        };
        self.notify(
            *cohort_id,
            CollectionKind::Tasks,
            ChangeKind::Added,
            task.id.to_string(),
            task.created_at,
        )
        .await;
        Ok(task)
    }

    async fn get_task(&self, cohort_id: &CohortId, task_id: &TaskId) -> Result<Task, StoreError> {
        let doc = self.cohorts.get(cohort_id).ok_or(StoreError::NotFound)?;
        doc.tasks
            .iter()
            .find(|task| task.id == *task_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn set_task_completed(
        &self,
        cohort_id: &CohortId,
        task_id: &TaskId,
        is_completed: bool,
    ) -> Result<(), StoreError> {
        let now = {
            let mut doc = self.cohorts.get_mut(cohort_id).ok_or(StoreError::NotFound)?;
            let task = doc
                .tasks
                .iter_mut()
                .find(|task| task.id == *task_id)
                .ok_or(StoreError::NotFound)?;
            task.is_completed = is_completed;
            doc.next_timestamp()
        };
        self.notify(
            *cohort_id,
            CollectionKind::Tasks,
            ChangeKind::Modified,
            task_id.to_string(),
            now,
        )
        .await;
        Ok(())
    }

    async fn list_tasks(&self, cohort_id: &CohortId) -> Result<Vec<Task>, StoreError> {
        self.cohorts
            .get(cohort_id)
            .map(|doc| doc.tasks.clone())
            .ok_or(StoreError::NotFound)
    }
}
