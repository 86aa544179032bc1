//! Durable storage for the credential record.
//!
//! SYSTEM CONTEXT
//! ==============
//! A session survives process restarts through two string entries in a
//! key/value store: the raw token under `token` and the JSON user record
//! under `user`. [`CredentialStore`] is the only code that touches those
//! keys and keeps them paired.
//!
//! Backends: [`MemoryStore`] for tests and throwaway sessions, [`FileStore`]
//! for the CLI (one 0600 file per key under the state directory).

#[cfg(test)]
#[path = "storage_test.rs"]
mod storage_test;

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

use crate::net::types::User;

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize user record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Minimal string key/value store, shaped like browser `localStorage`.
pub trait KeyValueStore: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// =============================================================================
// BACKENDS
// =============================================================================

/// In-process store. Clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).remove(key);
        Ok(())
    }
}

/// One file per key inside `dir`. Files are written with mode 0600 on unix.
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io { path: path.to_path_buf(), source }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).map_err(|e| io_error(&self.dir, e))?;
        let path = self.path_for(key);

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&path).map_err(|e| io_error(&path, e))?;
        file.write_all(value.as_bytes()).map_err(|e| io_error(&path, e))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}

// =============================================================================
// CREDENTIAL RECORD
// =============================================================================

/// What [`CredentialStore::load`] found on disk.
#[derive(Clone, Debug, PartialEq)]
pub struct PersistedCredentials {
    pub token: String,
    /// `None` if the identity entry was missing or could not be parsed.
    pub identity: Option<User>,
}

/// Paired token + identity persistence over a [`KeyValueStore`].
#[derive(Clone)]
pub struct CredentialStore {
    kv: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Read the persisted record.
    ///
    /// A corrupt identity entry is deleted and reported as `identity: None`;
    /// the token is left in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn load(&self) -> Result<Option<PersistedCredentials>, StorageError> {
        let Some(token) = self.kv.get(TOKEN_KEY)?.filter(|t| !t.trim().is_empty()) else {
            return Ok(None);
        };

        let identity = match self.kv.get(USER_KEY)? {
            None => None,
            Some(raw) => match serde_json::from_str::<User>(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!(error = %e, "discarding unparseable persisted user record");
                    self.kv.remove(USER_KEY)?;
                    None
                }
            },
        };

        Ok(Some(PersistedCredentials { token, identity }))
    }

    /// Write token and identity together. If the identity cannot be written
    /// the token is rolled back.
    ///
    /// # Errors
    ///
    /// Returns an error if either entry cannot be written.
    pub fn save(&self, token: &str, identity: &User) -> Result<(), StorageError> {
        let raw = serde_json::to_string(identity)?;
        self.kv.set(TOKEN_KEY, token)?;
        if let Err(e) = self.kv.set(USER_KEY, &raw) {
            if let Err(rollback) = self.kv.remove(TOKEN_KEY) {
                warn!(error = %rollback, "failed to roll back persisted token");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Overwrite the identity entry, keeping the stored token.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be written.
    pub fn save_identity(&self, identity: &User) -> Result<(), StorageError> {
        let raw = serde_json::to_string(identity)?;
        self.kv.set(USER_KEY, &raw)
    }

    /// Remove both entries. Both removals are attempted even if the first fails.
    ///
    /// # Errors
    ///
    /// Returns the first removal error.
    pub fn clear(&self) -> Result<(), StorageError> {
        let token = self.kv.remove(TOKEN_KEY);
        let user = self.kv.remove(USER_KEY);
        token.and(user)
    }

    /// [`clear`](Self::clear), logging instead of failing.
    pub(crate) fn clear_logged(&self) {
        if let Err(e) = self.clear() {
            warn!(error = %e, "failed to clear persisted credentials");
        }
    }
}
