use crate::{config_dir, ConfigError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Signed-in identities stored in ~/.cohort/config.json
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityConfig {
    #[serde(default)]
    pub identities: Vec<IdentityEntry>,
    #[serde(default)]
    pub current: Option<String>, // user_id of the signed-in identity
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IdentityEntry {
    pub user_id: String,
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl IdentityConfig {
    /// Load config from default path (~/.cohort/config.json)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::default_path()?)
    }

    /// Load config from custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound
            } else {
                ConfigError::Read(e)
            }
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Load config from custom path, starting empty when the file does not exist yet
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match Self::load_from(path) {
            Err(ConfigError::NotFound) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(Self::default_path()?)
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&self)?)?;
        Ok(())
    }

    /// Get default config path (~/.cohort/config.json)
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        Ok(config_dir()?.join("config.json"))
    }

    /// The signed-in identity, if any.
    pub fn current_identity(&self) -> Option<&IdentityEntry> {
        let current = self.current.as_ref()?;
        self.identities.iter().find(|i| &i.user_id == current)
    }

    /// Remember an identity and make it current. An entry with the same
    /// user id is replaced.
    pub fn sign_in(&mut self, entry: IdentityEntry) {
        self.current = Some(entry.user_id.clone());
        match self
            .identities
            .iter_mut()
            .find(|i| i.user_id == entry.user_id)
        {
            Some(existing) => *existing = entry,
            None => self.identities.push(entry),
        }
    }

    /// Forget which identity is current. Saved identities are kept.
    pub fn sign_out(&mut self) -> Result<IdentityEntry, ConfigError> {
        let entry = self
            .current_identity()
            .cloned()
            .ok_or(ConfigError::NotSignedIn)?;
        self.current = None;
        Ok(entry)
    }

    /// Find a saved identity by display name.
    pub fn find_by_name(&self, display_name: &str) -> Option<&IdentityEntry> {
        self.identities
            .iter()
            .find(|i| i.display_name == display_name)
    }
}
