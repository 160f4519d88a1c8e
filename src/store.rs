//! Persisted repository coordinates and credential material.
//!
//! Values survive between runs in a small TOML table. A missing key means
//! the corresponding setting is unconfigured.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::azure::RepositoryCoordinates;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read state file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write state file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse state file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Fixed names of the persisted values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKey {
    Organization,
    Project,
    RepositoryId,
    Email,
    AccessToken,
    AuthorId,
}

impl StateKey {
    pub fn as_str(self) -> &'static str {
        match self {
            StateKey::Organization => "organization",
            StateKey::Project => "project",
            StateKey::RepositoryId => "repositoryId",
            StateKey::Email => "email",
            StateKey::AccessToken => "accessToken",
            StateKey::AuthorId => "authorId",
        }
    }
}

/// Key-value storage for coordinates and credentials. Coordinates and
/// credentials are independent: changing one never touches the other.
pub trait ConfigStore {
    fn get(&self, key: StateKey) -> Option<String>;
    fn set(&mut self, key: StateKey, value: &str) -> Result<(), StoreError>;
    fn clear(&mut self, key: StateKey) -> Result<(), StoreError>;

    fn coordinates(&self) -> Option<RepositoryCoordinates> {
        Some(RepositoryCoordinates {
            organization: self.non_empty(StateKey::Organization)?,
            project: self.non_empty(StateKey::Project)?,
            repository_id: self.non_empty(StateKey::RepositoryId)?,
        })
    }

    /// Replace the coordinates wholesale.
    fn set_coordinates(&mut self, coordinates: &RepositoryCoordinates) -> Result<(), StoreError> {
        self.set(StateKey::Organization, &coordinates.organization)?;
        self.set(StateKey::Project, &coordinates.project)?;
        self.set(StateKey::RepositoryId, &coordinates.repository_id)
    }

    /// Store a new credential. The cached author id belongs to the previous
    /// credential, so it is cleared until resolved again.
    fn set_credential(&mut self, email: &str, access_token: &str) -> Result<(), StoreError> {
        self.set(StateKey::Email, email)?;
        self.set(StateKey::AccessToken, access_token)?;
        self.clear(StateKey::AuthorId)
    }

    fn access_token(&self) -> Option<String> {
        self.non_empty(StateKey::AccessToken)
    }

    fn author_id(&self) -> Option<String> {
        self.non_empty(StateKey::AuthorId)
    }

    fn has_coordinates(&self) -> bool {
        self.coordinates().is_some()
    }

    fn has_credentials(&self) -> bool {
        self.access_token().is_some() && self.author_id().is_some()
    }

    fn is_configured(&self) -> bool {
        self.has_coordinates() && self.has_credentials()
    }

    fn non_empty(&self, key: StateKey) -> Option<String> {
        self.get(key).filter(|value| !value.is_empty())
    }
}

/// `ConfigStore` persisted as a TOML table, rewritten on every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let values = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|source| StoreError::Read {
                path: path.clone(),
                source,
            })?;
            toml::from_str(&contents).map_err(|source| StoreError::Parse {
                path: path.clone(),
                source,
            })?
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), keys = values.len(), "opened state store");
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), StoreError> {
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let contents = toml::to_string(&self.values)?;

        // Owner-only from creation on: the file holds an access token.
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
            options.mode(0o600);
            // mode() only applies when the file is created
            if self.path.exists() {
                fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))
                    .map_err(write_err)?;
            }
        }
        let mut file = options.open(&self.path).map_err(write_err)?;
        file.write_all(contents.as_bytes()).map_err(write_err)?;
        Ok(())
    }
}

impl ConfigStore for FileStore {
    fn get(&self, key: StateKey) -> Option<String> {
        self.values.get(key.as_str()).cloned()
    }

    fn set(&mut self, key: StateKey, value: &str) -> Result<(), StoreError> {
        self.values.insert(key.as_str().to_string(), value.to_string());
        self.persist()
    }

    fn clear(&mut self, key: StateKey) -> Result<(), StoreError> {
        if self.values.remove(key.as_str()).is_some() {
            self.persist()?;
        }
        Ok(())
    }
}

/// In-memory `ConfigStore` for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: BTreeMap<&'static str, String>,
}

#[cfg(test)]
impl ConfigStore for MemoryStore {
    fn get(&self, key: StateKey) -> Option<String> {
        self.values.get(key.as_str()).cloned()
    }

    fn set(&mut self, key: StateKey, value: &str) -> Result<(), StoreError> {
        self.values.insert(key.as_str(), value.to_string());
        Ok(())
    }

    fn clear(&mut self, key: StateKey) -> Result<(), StoreError> {
        self.values.remove(key.as_str());
        Ok(())
    }
}
