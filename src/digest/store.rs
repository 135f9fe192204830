use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::KetchupError;

pub const STORE_SCHEMA_VERSION: u32 = 1;

/// Tokens granted when a user installed the app into a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installation {
    pub user_id: String,
    pub team_id: String,
    pub bot_token: String,
    pub user_token: String,
    pub installed_at_epoch_secs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default)]
    pub followed_channel_ids: Vec<String>,
    #[serde(default)]
    pub followed_user_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct StoreFile {
    schema_version: u32,
    installations: Vec<Installation>,
    settings: BTreeMap<String, UserSettings>,
}

impl Default for StoreFile {
    fn default() -> Self {
        Self {
            schema_version: STORE_SCHEMA_VERSION,
            installations: Vec::new(),
            settings: BTreeMap::new(),
        }
    }
}

/// Installations and per-user settings kept in one JSON file.
#[derive(Debug, Clone)]
pub struct IdentityStore {
    path: PathBuf,
    data: StoreFile,
}

impl IdentityStore {
    /// A missing file is an empty store.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self {
                path: path.to_path_buf(),
                data: StoreFile::default(),
            });
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let data: StoreFile = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        if data.schema_version != STORE_SCHEMA_VERSION {
            anyhow::bail!(
                "unsupported store schema version {} in {}",
                data.schema_version,
                path.display()
            );
        }
        Ok(Self {
            path: path.to_path_buf(),
            data,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_installation(
        &self,
        user_id: &str,
        team_id: &str,
    ) -> Result<&Installation, KetchupError> {
        self.data
            .installations
            .iter()
            .find(|i| i.user_id == user_id && i.team_id == team_id)
            .ok_or_else(|| KetchupError::MissingInstallation {
                user_id: user_id.to_string(),
                team_id: team_id.to_string(),
            })
    }

    pub fn get_user_settings(&self, user_id: &str) -> Result<&UserSettings, KetchupError> {
        self.data
            .settings
            .get(user_id)
            .ok_or_else(|| KetchupError::MissingSettings {
                user_id: user_id.to_string(),
            })
    }

    pub fn list_installations(&self) -> &[Installation] {
        &self.data.installations
    }

    /// Returns true when the installation is new. A new user also gets
    /// empty settings so they can run right away.
    pub fn upsert_installation(&mut self, installation: Installation) -> bool {
        let existing = self
            .data
            .installations
            .iter()
            .position(|i| i.user_id == installation.user_id && i.team_id == installation.team_id);
        let created = match existing {
            Some(idx) => {
                self.data.installations[idx] = installation.clone();
                false
            }
            None => {
                self.data.installations.push(installation.clone());
                true
            }
        };
        self.data
            .settings
            .entry(installation.user_id)
            .or_default();
        created
    }

    /// Replaces the user's followed channels and users wholesale.
    pub fn set_user_settings(&mut self, user_id: &str, settings: UserSettings) {
        self.data.settings.insert(user_id.to_string(), settings);
    }

    pub fn save(&self) -> Result<PathBuf> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
        let data = serde_json::to_string_pretty(&self.data)?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .with_context(|| format!("failed to stage write in {}", parent.display()))?;
        tmp.write_all(format!("{data}\n").as_bytes())?;
        tmp.persist(&self.path)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(self.path.clone())
    }
}
