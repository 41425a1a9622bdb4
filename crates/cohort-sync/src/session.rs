//! Cohort session: the composition root.
//!
//! A session owns its [`SyncEngine`] and the three subscriptions for the
//! active cohort. Membership and gate state are derived on demand from the
//! latest cohort snapshot and the clock; every write entry point re-checks
//! them before delegating to the engine.

use crate::access::WriteContext;
use crate::checklist::{self, TaskList};
use crate::countdown::countdown;
use crate::engine::SyncEngine;
use crate::error::SyncError;
use crate::feed::{self, MessageLog};
use crate::gate::{remaining, Clock, GateState, Remaining};
use crate::identity::{Identity, IdentityProvider};
use crate::membership::{self, is_member, CohortDocument};
use crate::share::{join_url, share_text};
use crate::subscription::{Snapshot, Subscription};
use cohort_config::SyncConfig;
use cohort_storage::{Cohort, CohortId, Message, Task, TaskId};
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Local view of the active cohort, replaced wholesale by each snapshot.
#[derive(Clone, Debug)]
pub struct CohortView {
    pub cohort: Cohort,
    pub messages: Vec<Message>,
    pub tasks: Vec<Task>,
}

/// Which part of the view the last snapshot replaced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionUpdate {
    Cohort,
    Feed,
    Checklist,
}

/// Derived state for rendering. Recomputed on every call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionStatus {
    pub signed_in: bool,
    pub is_member: bool,
    pub gate: GateState,
    pub remaining: Remaining,
    pub member_count: usize,
    /// Member of an active cohort. Writes still re-check this themselves.
    pub can_write: bool,
}

struct Streams {
    cohort: Subscription<Cohort>,
    messages: Subscription<Message>,
    tasks: Subscription<Task>,
}

enum Incoming {
    Cohort(Result<Snapshot<Cohort>, SyncError>),
    Messages(Result<Snapshot<Message>, SyncError>),
    Tasks(Result<Snapshot<Task>, SyncError>),
}

pub struct CohortSession {
    engine: SyncEngine,
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
    view: Option<CohortView>,
    streams: Option<Streams>,
}

impl CohortSession {
    pub fn new(
        engine: SyncEngine,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
    ) -> Self {
        Self {
            engine,
            identity,
            clock,
            config,
            view: None,
            streams: None,
        }
    }

    /// Bind the session to `cohort_id`.
    ///
    /// Releases the subscriptions of any previously active cohort first,
    /// then loads the cohort document once (`NotFound` if it does not
    /// resolve) and opens the cohort, feed and checklist subscriptions.
    pub async fn activate(&mut self, cohort_id: CohortId) -> Result<&CohortView, SyncError> {
        self.close();

        let cohort = self.engine.store().get_cohort(&cohort_id).await?;
        let cohort_stream = self.engine.subscribe(cohort_id, CohortDocument).await?;
        let messages = self.engine.subscribe(cohort_id, MessageLog).await?;
        let tasks = self.engine.subscribe(cohort_id, TaskList).await?;
        info!(%cohort_id, "session activated");

        self.streams = Some(Streams {
            cohort: cohort_stream,
            messages,
            tasks,
        });
        Ok(self.view.insert(CohortView {
            cohort,
            messages: Vec::new(),
            tasks: Vec::new(),
        }))
    }

    /// Release all subscriptions and drop the view. Idempotent.
    pub fn close(&mut self) {
        if let Some(view) = self.view.take() {
            debug!(cohort_id = %view.cohort.id, "closing session");
        }
        self.streams = None;
        self.engine.release_all();
    }

    pub fn is_active(&self) -> bool {
        self.streams.is_some()
    }

    pub fn view(&self) -> Option<&CohortView> {
        self.view.as_ref()
    }

    pub fn cohort(&self) -> Option<&Cohort> {
        self.view.as_ref().map(|view| &view.cohort)
    }

    pub fn messages(&self) -> &[Message] {
        self.view.as_ref().map_or(&[], |view| &view.messages)
    }

    pub fn tasks(&self) -> &[Task] {
        self.view.as_ref().map_or(&[], |view| &view.tasks)
    }

    pub fn current_user(&self) -> Option<Identity> {
        self.identity.current_user()
    }

    /// Wait for the next snapshot on any subscription and apply it to the
    /// view. `None` once the session is closed or every stream has ended.
    pub async fn next_update(&mut self) -> Option<Result<SessionUpdate, SyncError>> {
        let streams = self.streams.as_mut()?;
        let incoming = tokio::select! {
            Some(item) = streams.cohort.next() => Incoming::Cohort(item),
            Some(item) = streams.messages.next() => Incoming::Messages(item),
            Some(item) = streams.tasks.next() => Incoming::Tasks(item),
            else => return None,
        };
        Some(self.apply(incoming))
    }

    /// Wait until each of the three subscriptions has delivered at least one
    /// snapshot. The first read failure is returned as is.
    pub async fn await_initial_snapshots(&mut self) -> Result<(), SyncError> {
        let (mut cohort, mut feed, mut checklist) = (false, false, false);
        while !(cohort && feed && checklist) {
            match self.next_update().await {
                Some(Ok(SessionUpdate::Cohort)) => cohort = true,
                Some(Ok(SessionUpdate::Feed)) => feed = true,
                Some(Ok(SessionUpdate::Checklist)) => checklist = true,
                Some(Err(e)) => return Err(e),
                None => return Err(SyncError::NotFound),
            }
        }
        Ok(())
    }

    fn apply(&mut self, incoming: Incoming) -> Result<SessionUpdate, SyncError> {
        let result = apply_snapshot(self.view.as_mut(), incoming);
        if let Err(e) = &result {
            warn!("snapshot not applied: {}", e);
        }
        result
    }

    pub fn status(&self) -> Result<SessionStatus, SyncError> {
        let cohort = self.active_cohort()?;
        let now = self.clock.now();
        let user = self.identity.current_user();
        let member = user
            .as_ref()
            .is_some_and(|user| is_member(cohort, &user.id));
        let gate = GateState::at(cohort, now);
        Ok(SessionStatus {
            signed_in: user.is_some(),
            is_member: member,
            gate,
            remaining: remaining(cohort, now),
            member_count: cohort.member_count(),
            can_write: member && gate == GateState::Active,
        })
    }

    // ───────────────────────────── Writes ────────────────────────────

    /// Join the active cohort. Returns `true` if the member set grew.
    pub async fn join(&mut self) -> Result<bool, SyncError> {
        let user = self.identity.current_user();
        let cohort = self.active_cohort()?;
        let ctx = WriteContext::new(cohort, user.as_ref(), &*self.clock);
        let joined = membership::join(&self.engine, &ctx)
            .await
            .inspect_err(|e| warn!(cohort_id = %cohort.id, "join rejected: {}", e))?;

        // Reflect the confirmed write before the cohort snapshot arrives.
        if let (Some(user), Some(view)) = (user, self.view.as_mut()) {
            if !view.cohort.has_member(&user.id) {
                view.cohort.members.push(user.id);
            }
        }
        Ok(joined)
    }

    pub async fn send(&self, text: &str) -> Result<Message, SyncError> {
        let user = self.identity.current_user();
        let cohort = self.active_cohort()?;
        let ctx = WriteContext::new(cohort, user.as_ref(), &*self.clock);
        feed::send(&self.engine, &ctx, text)
            .await
            .inspect_err(|e| warn!(cohort_id = %cohort.id, "send rejected: {}", e))
    }

    pub async fn add_task(&self, text: &str) -> Result<Task, SyncError> {
        let user = self.identity.current_user();
        let cohort = self.active_cohort()?;
        let ctx = WriteContext::new(cohort, user.as_ref(), &*self.clock);
        checklist::add_task(&self.engine, &ctx, text)
            .await
            .inspect_err(|e| warn!(cohort_id = %cohort.id, "add_task rejected: {}", e))
    }

    /// Flip a task's completion flag. Returns the new value.
    pub async fn toggle_task(&self, task_id: TaskId) -> Result<bool, SyncError> {
        let user = self.identity.current_user();
        let cohort = self.active_cohort()?;
        let ctx = WriteContext::new(cohort, user.as_ref(), &*self.clock);
        checklist::toggle_task(&self.engine, &ctx, task_id)
            .await
            .inspect_err(|e| warn!(cohort_id = %cohort.id, "toggle_task rejected: {}", e))
    }

    // ───────────────────────────── Display ───────────────────────────

    pub fn join_link(&self) -> Result<String, SyncError> {
        Ok(join_url(&self.config.origin, &self.active_cohort()?.id))
    }

    pub fn share_text(&self) -> Result<String, SyncError> {
        Ok(share_text(self.active_cohort()?))
    }

    /// Countdown to the active cohort's end at the configured interval.
    pub fn countdown(&self) -> Result<impl Stream<Item = Remaining> + Send + 'static, SyncError> {
        let ends_at = self.active_cohort()?.ends_at;
        Ok(countdown(
            self.clock.clone(),
            ends_at,
            self.config.countdown_interval,
        ))
    }

    fn active_cohort(&self) -> Result<&Cohort, SyncError> {
        self.cohort().ok_or(SyncError::NotFound)
    }
}

fn apply_snapshot(
    view: Option<&mut CohortView>,
    incoming: Incoming,
) -> Result<SessionUpdate, SyncError> {
    let view = view.ok_or(SyncError::NotFound)?;
    match incoming {
        Incoming::Cohort(snapshot) => {
            view.cohort = snapshot?
                .items
                .into_iter()
                .next()
                .ok_or(SyncError::NotFound)?;
            Ok(SessionUpdate::Cohort)
        }
        Incoming::Messages(snapshot) => {
            view.messages = snapshot?.items;
            Ok(SessionUpdate::Feed)
        }
        Incoming::Tasks(snapshot) => {
            view.tasks = snapshot?.items;
            Ok(SessionUpdate::Checklist)
        }
    }
}

impl Drop for CohortSession {
    fn drop(&mut self) {
        self.close();
    }
}
