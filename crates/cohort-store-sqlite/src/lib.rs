//! SQLite document store.
//!
//! Cohort documents are normalised into tables; the member set is a
//! `(cohort_id, user_id)` keyed table so that joining is a single
//! `INSERT OR IGNORE` (atomic set-add). Timestamps are stored as Unix
//! milliseconds. Membership changes are also published on each member's
//! directory channel.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cohort_events::{ChangeEvent, ChangeKind, ChannelKey, CollectionKind, EventBus};
use cohort_storage::{
    Cohort, CohortId, CreateCohortParams, CreateUserParams, Message, MessageId, NewMessage,
    NewTask, Store, StoreError, Task, TaskId, UserId, UserProfile,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

type CohortRow = (String, String, String, i64, String, i64);
type MessageRow = (String, String, String, String, i64);
type TaskRow = (String, String, bool, String, i64);

pub struct SqliteStore {
    pool: SqlitePool,
    events: Arc<dyn EventBus>,
}

impl SqliteStore {
    pub async fn open_in_memory(events: Arc<dyn EventBus>) -> Result<Self, StoreError> {
        Self::open("sqlite::memory:", events).await
    }

    pub async fn open(url: &str, events: Arc<dyn EventBus>) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(backend)?
            .create_if_missing(true);
        // One long-lived connection: an in-memory database lives exactly as long as it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(backend)?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self { pool, events })
    }

    async fn notify(
        &self,
        cohort_id: CohortId,
        collection: CollectionKind,
        change: ChangeKind,
        doc_id: String,
        timestamp: i64,
    ) {
        let event = ChangeEvent {
            collection,
            change,
            doc_id,
            timestamp,
        };
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
        timestamp: i64,
    ) {
        for user_id in members {
            let event = ChangeEvent {
                collection: CollectionKind::Cohort,
                change: change.clone(),
                doc_id: cohort_id.to_string(),
                timestamp,
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

    async fn cohort_exists(&self, cohort_id: &CohortId) -> Result<bool, StoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT id FROM cohorts WHERE id=?")
            .bind(cohort_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(row.is_some())
    }

    async fn members_of(&self, cohort_id: &str) -> Result<Vec<UserId>, StoreError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT user_id FROM cohort_members WHERE cohort_id=? ORDER BY rowid")
                .bind(cohort_id)
                .fetch_all(&self.pool)
                .await
                .map_err(backend)?;
        Ok(rows.into_iter().map(|(id,)| UserId(id)).collect())
    }

    async fn hydrate_cohort(&self, row: CohortRow) -> Result<Cohort, StoreError> {
        let (id, name, goal, ends_at, creator_id, created_at) = row;
        let members = self.members_of(&id).await?;
        Ok(Cohort {
            id: CohortId(parse_uuid(&id)?),
            name,
            goal,
            ends_at: from_millis(ends_at)?,
            creator_id: UserId(creator_id),
            members,
            created_at: from_millis(created_at)?,
        })
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::try_parse(s).map_err(|e| StoreError::Backend(e.to_string()))
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Backend(format!("timestamp out of range: {ms}")))
}

#[async_trait]
impl Store for SqliteStore {
    // ───────────────────────────── Users ─────────────────────────────

    async fn create_user_if_absent(&self, params: &CreateUserParams) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO users(id,display_name,email,created_at) VALUES(?,?,?,?)",
        )
        .bind(params.id.as_str())
        .bind(&params.display_name)
        .bind(params.email.as_deref())
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_user(&self, user_id: &UserId) -> Result<UserProfile, StoreError> {
        let row: Option<(String, String, Option<String>, i64)> =
            sqlx::query_as("SELECT id,display_name,email,created_at FROM users WHERE id=?")
                .bind(user_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;

        match row {
            None => Err(StoreError::NotFound),
            Some((id, display_name, email, created_at)) => Ok(UserProfile {
                id: UserId(id),
                display_name,
                email,
                created_at: from_millis(created_at)?,
            }),
        }
    }

    // ───────────────────────────── Cohorts ───────────────────────────

    async fn create_cohort(&self, params: &CreateCohortParams) -> Result<Cohort, StoreError> {
        let id = CohortId::generate();
        let now = Utc::now();
        let now_ms = now.timestamp_millis();

        let mut tx = self.pool.begin().await.map_err(backend)?;
        sqlx::query(
            "INSERT INTO cohorts(id,name,goal,ends_at,creator_id,created_at) VALUES(?,?,?,?,?,?)",
        )
        .bind(id.to_string())
        .bind(&params.name)
        .bind(&params.goal)
        .bind(params.ends_at.timestamp_millis())
        .bind(params.creator_id.as_str())
        .bind(now_ms)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;
        sqlx::query("INSERT INTO cohort_members(cohort_id,user_id,joined_at) VALUES(?,?,?)")
            .bind(id.to_string())
            .bind(params.creator_id.as_str())
            .bind(now_ms)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        tx.commit().await.map_err(backend)?;

        self.notify(
            id,
            CollectionKind::Cohort,
            ChangeKind::Added,
            id.to_string(),
            now_ms,
        )
        .await;
        self.notify_directories(
            std::slice::from_ref(&params.creator_id),
            id,
            ChangeKind::Added,
            now_ms,
        )
        .await;

        // Read back so millisecond truncation matches later reads.
        self.get_cohort(&id).await
    }

    async fn get_cohort(&self, cohort_id: &CohortId) -> Result<Cohort, StoreError> {
        let row: Option<CohortRow> = sqlx::query_as(
            "SELECT id,name,goal,ends_at,creator_id,created_at FROM cohorts WHERE id=?",
        )
        .bind(cohort_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            None => Err(StoreError::NotFound),
            Some(row) => self.hydrate_cohort(row).await,
        }
    }

    async fn list_cohorts_for_member(&self, user_id: &UserId) -> Result<Vec<Cohort>, StoreError> {
        let rows: Vec<CohortRow> = sqlx::query_as(
            "SELECT c.id,c.name,c.goal,c.ends_at,c.creator_id,c.created_at
             FROM cohorts c JOIN cohort_members m ON m.cohort_id = c.id
             WHERE m.user_id=?
             ORDER BY c.ends_at ASC, c.id ASC",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(self.hydrate_cohort(row).await?);
        }
        Ok(out)
    }

    async fn add_member(
        &self,
        cohort_id: &CohortId,
        user_id: &UserId,
    ) -> Result<bool, StoreError> {
        if !self.cohort_exists(cohort_id).await? {
            return Err(StoreError::NotFound);
        }

        let now_ms = Utc::now().timestamp_millis();
        let result = sqlx::query(
            "INSERT OR IGNORE INTO cohort_members(cohort_id,user_id,joined_at) VALUES(?,?,?)",
        )
        .bind(cohort_id.to_string())
        .bind(user_id.as_str())
        .bind(now_ms)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        let added = result.rows_affected() == 1;
        if added {
            self.notify(
                *cohort_id,
                CollectionKind::Cohort,
                ChangeKind::Modified,
                cohort_id.to_string(),
                now_ms,
            )
            .await;
            match self.members_of(&cohort_id.to_string()).await {
                Ok(members) => {
                    self.notify_directories(&members, *cohort_id, ChangeKind::Modified, now_ms)
                        .await
                }
                Err(e) => warn!(%cohort_id, "failed to read members for directory events: {}", e),
            }
        }
        Ok(added)
    }

    // ───────────────────────────── Messages ──────────────────────────

    async fn append_message(
        &self,
        cohort_id: &CohortId,
        params: &NewMessage,
    ) -> Result<Message, StoreError> {
        if !self.cohort_exists(cohort_id).await? {
            return Err(StoreError::NotFound);
        }

        let id = MessageId::generate();
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let last: Option<i64> =
            sqlx::query_scalar("SELECT MAX(created_at) FROM messages WHERE cohort_id=?")
                .bind(cohort_id.to_string())
                .fetch_one(&mut *tx)
                .await
                .map_err(backend)?;
        // Server time never goes backwards within a cohort's feed.
        let created_ms = Utc::now().timestamp_millis().max(last.unwrap_or(i64::MIN));

        sqlx::query(
            "INSERT INTO messages(id,cohort_id,text,sender_id,sender_name,created_at)
             VALUES(?,?,?,?,?,?)",
        )
        .bind(id.to_string())
        .bind(cohort_id.to_string())
        .bind(&params.text)
        .bind(params.sender_id.as_str())
        .bind(&params.sender_name)
        .bind(created_ms)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;
        tx.commit().await.map_err(backend)?;

        self.notify(
            *cohort_id,
            CollectionKind::Messages,
            ChangeKind::Added,
            id.to_string(),
            created_ms,
        )
        .await;

        Ok(Message {
            id,
            cohort_id: *cohort_id,
            text: params.text.clone(),
            sender_id: params.sender_id.clone(),
            sender_name: params.sender_name.clone(),
            timestamp: from_millis(created_ms)?,
        })
    }

    async fn list_messages(&self, cohort_id: &CohortId) -> Result<Vec<Message>, StoreError> {
        if !self.cohort_exists(cohort_id).await? {
            return Err(StoreError::NotFound);
        }

        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id,text,sender_id,sender_name,created_at FROM messages
             WHERE cohort_id=? ORDER BY created_at ASC, id ASC",
        )
        .bind(cohort_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter()
            .map(|(id, text, sender_id, sender_name, created_at)| {
                Ok(Message {
                    id: MessageId(parse_uuid(&id)?),
                    cohort_id: *cohort_id,
                    text,
                    sender_id: UserId(sender_id),
                    sender_name,
                    timestamp: from_millis(created_at)?,
                })
            })
            .collect()
    }

    // ───────────────────────────── Tasks ─────────────────────────────

    async fn create_task(
        &self,
        cohort_id: &CohortId,
        params: &NewTask,
    ) -> Result<Task, StoreError> {
        if !self.cohort_exists(cohort_id).await? {
            return Err(StoreError::NotFound);
        }

        let id = TaskId::generate();
        let created_ms = Utc::now().timestamp_millis();
        sqlx::query(
            "INSERT INTO tasks(id,cohort_id,text,is_completed,creator_id,created_at)
             VALUES(?,?,?,0,?,?)",
        )
        .bind(id.to_string())
        .bind(cohort_id.to_string())
        .bind(&params.text)
        .bind(params.creator_id.as_str())
        .bind(created_ms)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        self.notify(
            *cohort_id,
            CollectionKind::Tasks,
            ChangeKind::Added,
            id.to_string(),
            created_ms,
        )
        .await;

        Ok(Task {
            id,
            cohort_id: *cohort_id,
            text: params.text.clone(),
            is_completed: false,
            creator_id: params.creator_id.clone(),
            created_at: from_millis(created_ms)?,
        })
    }

    async fn get_task(&self, cohort_id: &CohortId, task_id: &TaskId) -> Result<Task, StoreError> {
        let row: Option<TaskRow> = sqlx::query_as(
            "SELECT id,text,is_completed,creator_id,created_at FROM tasks
             WHERE cohort_id=? AND id=?",
        )
        .bind(cohort_id.to_string())
        .bind(task_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            None => Err(StoreError::NotFound),
            Some(row) => task_from_row(*cohort_id, row),
        }
    }

    async fn set_task_completed(
        &self,
        cohort_id: &CohortId,
        task_id: &TaskId,
        is_completed: bool,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE tasks SET is_completed=? WHERE cohort_id=? AND id=?")
            .bind(is_completed)
            .bind(cohort_id.to_string())
            .bind(task_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        self.notify(
            *cohort_id,
            CollectionKind::Tasks,
            ChangeKind::Modified,
            task_id.to_string(),
            Utc::now().timestamp_millis(),
        )
        .await;
        Ok(())
    }

    async fn list_tasks(&self, cohort_id: &CohortId) -> Result<Vec<Task>, StoreError> {
        if !self.cohort_exists(cohort_id).await? {
            return Err(StoreError::NotFound);
        }

        let rows: Vec<TaskRow> = sqlx::query_as(
            "SELECT id,text,is_completed,creator_id,created_at FROM tasks
             WHERE cohort_id=? ORDER BY rowid",
        )
        .bind(cohort_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter()
            .map(|row| task_from_row(*cohort_id, row))
            .collect()
    }
}

fn task_from_row(cohort_id: CohortId, row: TaskRow) -> Result<Task, StoreError> {
    let (id, text, is_completed, creator_id, created_at) = row;
    Ok(Task {
        id: TaskId(parse_uuid(&id)?),
        cohort_id,
        text,
        is_completed,
        creator_id: UserId(creator_id),
        created_at: from_millis(created_at)?,
    })
}
