use cohort_config::{config_dir, IdentityConfig, SyncConfig};
use cohort_events_memory::MemoryEventBus;
use cohort_storage::{CohortId, TaskId};
use cohort_store_sqlite::SqliteStore;
use cohort_sync::{
    Clock, CohortSession, FileIdentityProvider, Identity, IdentityProvider, SyncEngine, SyncError,
    SystemClock,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Everything a command needs: the local database, the identity file and
/// runtime settings.
pub struct Context {
    pub store: Arc<SqliteStore>,
    pub bus: Arc<MemoryEventBus>,
    pub clock: Arc<dyn Clock>,
    pub config: SyncConfig,
    pub identity_path: PathBuf,
}

impl Context {
    pub async fn open(identity_path: Option<PathBuf>) -> Result<Self, Box<dyn std::error::Error>> {
        let config = SyncConfig::from_env()?;
        let identity_path = match identity_path {
            Some(path) => path,
            None => IdentityConfig::default_path()?,
        };
        if config.database_url.is_none() {
            std::fs::create_dir_all(config_dir()?)?;
        }

        let bus = Arc::new(MemoryEventBus::with_capacity(config.event_capacity));
        let store = SqliteStore::open(&config.resolved_database_url()?, bus.clone()).await?;

        Ok(Self {
            store: Arc::new(store),
            bus,
            clock: Arc::new(SystemClock),
            config,
            identity_path,
        })
    }

    pub fn provider(&self) -> FileIdentityProvider {
        FileIdentityProvider::new(&self.identity_path)
    }

    pub fn current_user(&self) -> Option<Identity> {
        self.provider().current_user()
    }

    pub fn session(&self) -> CohortSession {
        CohortSession::new(
            SyncEngine::new(self.store.clone(), self.bus.clone()),
            Arc::new(self.provider()),
            self.clock.clone(),
            self.config.clone(),
        )
    }

    /// A session bound to `cohort_id` with its first snapshots applied.
    pub async fn open_session(&self, cohort_id: &str) -> Result<CohortSession, SyncError> {
        let mut session = self.session();
        session.activate(parse_cohort_id(cohort_id)?).await?;
        session.await_initial_snapshots().await?;
        Ok(session)
    }
}

/// Ids that don't parse can't resolve to a cohort.
pub fn parse_cohort_id(s: &str) -> Result<CohortId, SyncError> {
    s.trim().parse().map_err(|_| SyncError::NotFound)
}

pub fn parse_task_id(s: &str) -> Result<TaskId, SyncError> {
    s.trim().parse().map_err(|_| SyncError::NotFound)
}
