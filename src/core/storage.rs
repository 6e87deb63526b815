//! Durable session state
//!
//! A small key-value store backed by one file per entry under the
//! application data directory. The chat store is saved wholesale after every
//! mutation as a single JSON entry; the API credential lives in a sibling
//! entry. Writes go through a temp file and an atomic rename so a crash
//! never leaves a half-written entry behind.

use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tempfile::NamedTempFile;

use crate::core::chat::ChatStore;

const CHATS_KEY: &str = "chats";
const CREDENTIAL_KEY: &str = "api_key";

/// Errors raised by the key-value store.
#[derive(Debug)]
pub enum StorageError {
    /// Failed to read an entry from disk.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write an entry to disk.
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An entry did not contain valid JSON for its expected type.
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// A value could not be serialized to JSON.
    Encode(serde_json::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Read { path, source } => {
                write!(f, "Failed to read {}: {}", path.display(), source)
            }
            StorageError::Write { path, source } => {
                write!(f, "Failed to write {}: {}", path.display(), source)
            }
            StorageError::Parse { path, source } => {
                write!(f, "Failed to parse {}: {}", path.display(), source)
            }
            StorageError::Encode(source) => {
                write!(f, "Failed to serialize state: {source}")
            }
        }
    }
}

impl StdError for StorageError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            StorageError::Read { source, .. } => Some(source),
            StorageError::Write { source, .. } => Some(source),
            StorageError::Parse { source, .. } => Some(source),
            StorageError::Encode(source) => Some(source),
        }
    }
}

/// Key-value store rooted at a directory; each key maps to one file.
#[derive(Debug)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Store rooted at the platform data directory.
    pub fn open_default() -> Self {
        let proj_dirs = ProjectDirs::from("org", "permacommons", "causerie")
            .expect("Failed to determine data directory");
        Self::at(proj_dirs.data_dir().to_path_buf())
    }

    /// Store rooted at an explicit directory.
    pub fn at(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    /// Read a raw entry; absent entries are `None`.
    pub fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|source| StorageError::Read { path, source })
    }

    /// Write a raw entry atomically, creating the store directory on first
    /// use.
    pub fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.entry_path(key);
        let write_err = |source: std::io::Error| StorageError::Write {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(write_err)?;

        let mut temp_file = NamedTempFile::new_in(&self.dir).map_err(write_err)?;
        temp_file.write_all(value.as_bytes()).map_err(write_err)?;
        temp_file.as_file_mut().sync_all().map_err(write_err)?;
        temp_file.persist(&path).map_err(|err| StorageError::Write {
            path: path.clone(),
            source: err.error,
        })?;
        Ok(())
    }

    /// Load the persisted chat store; an absent entry is an empty store.
    pub fn load_chats(&self) -> Result<ChatStore, StorageError> {
        match self.get(CHATS_KEY)? {
            Some(contents) => {
                serde_json::from_str(&contents).map_err(|source| StorageError::Parse {
                    path: self.entry_path(CHATS_KEY),
                    source,
                })
            }
            None => Ok(ChatStore::new()),
        }
    }

    /// Persist the full chat store, replacing the previous copy.
    pub fn save_chats(&self, chats: &ChatStore) -> Result<(), StorageError> {
        let contents = serde_json::to_string(chats).map_err(StorageError::Encode)?;
        self.set(CHATS_KEY, &contents)
    }

    /// The stored API credential, if any. Whitespace-only entries count as
    /// absent.
    pub fn credential(&self) -> Result<Option<String>, StorageError> {
        Ok(self
            .get(CREDENTIAL_KEY)?
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty()))
    }

    pub fn store_credential(&self, credential: &str) -> Result<(), StorageError> {
        self.set(CREDENTIAL_KEY, credential.trim())
    }
}
