//! Identity providers.
//!
//! The session asks the provider for the current user on every write, so a
//! sign-out takes effect immediately. No identity means "guest": guests can
//! read but never write.

use crate::error::SyncError;
use async_trait::async_trait;
use cohort_config::{ConfigError, IdentityConfig, IdentityEntry};
use cohort_storage::{CreateUserParams, Store, UserId};
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub id: UserId,
    pub display_name: String,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: UserId(id.into()),
            display_name: display_name.into(),
            email: None,
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The signed-in identity, or `None` for a guest.
    fn current_user(&self) -> Option<Identity>;

    async fn sign_in(&self) -> Result<Identity, SyncError>;

    async fn sign_out(&self);
}

/// Sign in through `provider` and make sure a user profile exists for the
/// identity. Existing profiles are left untouched.
pub async fn sign_in(
    provider: &dyn IdentityProvider,
    store: &dyn Store,
) -> Result<Identity, SyncError> {
    let identity = provider.sign_in().await?;
    let created = store
        .create_user_if_absent(&CreateUserParams {
            id: identity.id.clone(),
            display_name: identity.display_name.clone(),
            email: identity.email.clone(),
        })
        .await?;
    info!(user_id = %identity.id, created, "signed in");
    Ok(identity)
}

/// Provider holding the identity in memory.
pub struct MemoryIdentityProvider {
    current: RwLock<Option<Identity>>,
    account: Option<Identity>,
}

impl MemoryIdentityProvider {
    /// Already signed in as `identity`.
    pub fn signed_in(identity: Identity) -> Self {
        Self {
            current: RwLock::new(Some(identity.clone())),
            account: Some(identity),
        }
    }

    /// A guest that signs in as `account` when asked.
    pub fn with_account(account: Identity) -> Self {
        Self {
            current: RwLock::new(None),
            account: Some(account),
        }
    }

    /// A guest with no account to sign in with.
    pub fn guest() -> Self {
        Self {
            current: RwLock::new(None),
            account: None,
        }
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    fn current_user(&self) -> Option<Identity> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn sign_in(&self) -> Result<Identity, SyncError> {
        let account = self.account.clone().ok_or(SyncError::Unauthenticated)?;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(account.clone());
        Ok(account)
    }

    async fn sign_out(&self) {
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

/// Provider backed by the saved identities in the CLI config file.
pub struct FileIdentityProvider {
    path: PathBuf,
    credentials: Option<(String, Option<String>)>,
}

impl FileIdentityProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            credentials: None,
        }
    }

    /// Provider at the default location (~/.cohort/config.json).
    pub fn open_default() -> Result<Self, ConfigError> {
        Ok(Self::new(IdentityConfig::default_path()?))
    }

    /// Display name (and optional email) to sign in with.
    pub fn with_credentials(mut self, display_name: &str, email: Option<&str>) -> Self {
        self.credentials = Some((display_name.to_string(), email.map(str::to_string)));
        self
    }

    fn load(&self) -> Result<IdentityConfig, ConfigError> {
        IdentityConfig::load_or_default(&self.path)
    }
}

fn to_identity(entry: &IdentityEntry) -> Identity {
    Identity {
        id: UserId(entry.user_id.clone()),
        display_name: entry.display_name.clone(),
        email: entry.email.clone(),
    }
}

#[async_trait]
impl IdentityProvider for FileIdentityProvider {
    fn current_user(&self) -> Option<Identity> {
        match self.load() {
            Ok(config) => config.current_identity().map(to_identity),
            Err(e) => {
                warn!(path = %self.path.display(), "failed to read identity config: {}", e);
                None
            }
        }
    }

    async fn sign_in(&self) -> Result<Identity, SyncError> {
        let (display_name, email) = self
            .credentials
            .clone()
            .ok_or(SyncError::Unauthenticated)?;
        let display_name = display_name.trim().to_string();
        if display_name.is_empty() {
            return Err(SyncError::Empty);
        }

        let mut config = self
            .load()
            .map_err(|e| SyncError::SyncUnavailable(e.to_string()))?;
        // Signing in again under a saved name keeps that user's id.
        let user_id = config
            .find_by_name(&display_name)
            .map(|entry| entry.user_id.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let entry = IdentityEntry {
            user_id,
            display_name,
            email,
        };
        config.sign_in(entry.clone());
        config
            .save_to(&self.path)
            .map_err(|e| SyncError::SyncUnavailable(e.to_string()))?;
        Ok(to_identity(&entry))
    }

    async fn sign_out(&self) {
        let result = self.load().and_then(|mut config| {
            config.sign_out()?;
            config.save_to(&self.path)
        });
        match result {
            Ok(()) | Err(ConfigError::NotSignedIn) => {}
            Err(e) => warn!(path = %self.path.display(), "failed to sign out: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_provider_signs_in_and_out() {
        let provider = MemoryIdentityProvider::with_account(Identity::new("u1", "Ana"));
        assert_eq!(provider.current_user(), None);

        let identity = provider.sign_in().await.unwrap();
        assert_eq!(identity.display_name, "Ana");
        assert_eq!(provider.current_user(), Some(identity));

        provider.sign_out().await;
        assert_eq!(provider.current_user(), None);
    }

    #[tokio::test]
    async fn guest_cannot_sign_in() {
        let provider = MemoryIdentityProvider::guest();
        assert_eq!(provider.sign_in().await, Err(SyncError::Unauthenticated));
    }

    #[tokio::test]
    async fn file_provider_persists_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let provider =
            FileIdentityProvider::new(&path).with_credentials("Ana", Some("ana@example.com"));
        assert_eq!(provider.current_user(), None);
        let first = provider.sign_in().await.unwrap();

        // A fresh provider over the same file sees the same identity.
        let reopened = FileIdentityProvider::new(&path);
        assert_eq!(reopened.current_user(), Some(first.clone()));

        reopened.sign_out().await;
        assert_eq!(provider.current_user(), None);

        // Same display name, same user id.
        let again = provider.sign_in().await.unwrap();
        assert_eq!(again.id, first.id);
    }

    #[tokio::test]
    async fn file_provider_without_credentials_is_unauthenticated() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FileIdentityProvider::new(dir.path().join("config.json"));
        assert_eq!(provider.sign_in().await, Err(SyncError::Unauthenticated));

        let blank = FileIdentityProvider::new(dir.path().join("config.json"))
            .with_credentials("   ", None);
        assert_eq!(blank.sign_in().await, Err(SyncError::Empty));
    }
}
