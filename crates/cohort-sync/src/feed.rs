//! Message feed: an append-only log per cohort, presented in
//! `(timestamp, id)` order.

use crate::access::{normalize_text, WriteContext};
use crate::engine::{Guard, SyncEngine, SyncedCollection, WriteIntent};
use crate::error::SyncError;
use async_trait::async_trait;
use cohort_events::CollectionKind;
use cohort_storage::{CohortId, Message, NewMessage, Store, StoreError, UserId};

#[derive(Clone, Copy, Debug, Default)]
pub struct MessageLog;

#[async_trait]
impl SyncedCollection for MessageLog {
    type Item = Message;

    fn kind(&self) -> CollectionKind {
        CollectionKind::Messages
    }

    async fn load(
        &self,
        store: &dyn Store,
        cohort_id: &CohortId,
    ) -> Result<Vec<Message>, StoreError> {
        let mut messages = store.list_messages(cohort_id).await?;
        sort_feed(&mut messages);
        Ok(messages)
    }
}

/// Ascending by store timestamp; equal timestamps fall back to the
/// store-assigned id so every snapshot has one total order.
pub fn sort_feed(messages: &mut [Message]) {
    messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
}

pub struct PostMessage {
    pub text: String,
    pub sender_id: UserId,
    /// Captured at send time and never re-resolved.
    pub sender_name: String,
}

#[async_trait]
impl WriteIntent for PostMessage {
    type Output = Message;

    fn label(&self) -> &'static str {
        "send"
    }

    async fn apply(
        &self,
        store: &dyn Store,
        cohort_id: &CohortId,
        guard: &Guard<'_>,
    ) -> Result<Message, SyncError> {
        guard()?;
        let message = store
            .append_message(
                cohort_id,
                &NewMessage {
                    text: self.text.clone(),
                    sender_id: self.sender_id.clone(),
                    sender_name: self.sender_name.clone(),
                },
            )
            .await?;
        Ok(message)
    }
}

pub async fn send(
    engine: &SyncEngine,
    ctx: &WriteContext<'_>,
    text: &str,
) -> Result<Message, SyncError> {
    let author = ctx.identity()?;
    let text = normalize_text(text)?;
    ctx.ensure_member(author)?;
    ctx.ensure_active()?;

    let gate = ctx.gate();
    let intent = PostMessage {
        text,
        sender_id: author.id.clone(),
        sender_name: author.display_name.clone(),
    };
    engine.dispatch(ctx.cohort.id, &intent, &gate).await
}
