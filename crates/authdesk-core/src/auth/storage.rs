//! Durable key-value storage behind the session store.
//!
//! Exactly two entries are ever written: the raw access token and the JSON
//! user record. Backends:
//! - `FileStorage`: one file per entry in the data directory (default)
//! - `KeyringStorage`: OS keychain via `keyring`
//! - `MemoryStorage`: process-local, for tests and throwaway sessions

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use keyring::Entry;

/// Keychain service name for `KeyringStorage`
pub const KEYRING_SERVICE: &str = "authdesk";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    /// Raw access token
    Token,
    /// Serialized `UserRead`
    User,
}

impl StorageKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::Token => "token",
            StorageKey::User => "user",
        }
    }

    fn file_name(&self) -> &'static str {
        match self {
            StorageKey::Token => "token",
            StorageKey::User => "user.json",
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key-value store that survives process restarts.
///
/// `erase` on a missing key succeeds.
pub trait DurableStorage: Send + Sync {
    fn read(&self, key: StorageKey) -> Result<Option<String>>;
    fn write(&self, key: StorageKey, value: &str) -> Result<()>;
    fn erase(&self, key: StorageKey) -> Result<()>;
}

// ============================================================================
// File storage
// ============================================================================

pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: StorageKey) -> PathBuf {
        self.dir.join(key.file_name())
    }
}

impl DurableStorage for FileStorage {
    fn read(&self, key: StorageKey) -> Result<Option<String>> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {} file", key))?;
        Ok(Some(contents))
    }

    fn write(&self, key: StorageKey, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir).context("Failed to create data directory")?;
        std::fs::write(self.entry_path(key), value)
            .with_context(|| format!("Failed to write {} file", key))?;
        Ok(())
    }

    fn erase(&self, key: StorageKey) -> Result<()> {
        let path = self.entry_path(key);
        if path.exists() {
            std::fs::remove_file(path).with_context(|| format!("Failed to remove {} file", key))?;
        }
        Ok(())
    }
}

// ============================================================================
// Keyring storage
// ============================================================================

pub struct KeyringStorage {
    service: String,
}

impl KeyringStorage {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: StorageKey) -> Result<Entry> {
        Entry::new(&self.service, key.as_str()).context("Failed to create keyring entry")
    }
}

impl Default for KeyringStorage {
    fn default() -> Self {
        Self::new(KEYRING_SERVICE)
    }
}

impl DurableStorage for KeyringStorage {
    fn read(&self, key: StorageKey) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve entry from keychain"),
        }
    }

    fn write(&self, key: StorageKey, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .context("Failed to store entry in keychain")
    }

    fn erase(&self, key: StorageKey) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete entry from keychain"),
        }
    }
}

// ============================================================================
// Memory storage
// ============================================================================

#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<StorageKey, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-seeded with entries, as if left behind by an earlier process
    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (StorageKey, &'a str)>) -> Self {
        let storage = Self::new();
        {
            let mut map = storage.lock();
            for (key, value) in entries {
                map.insert(key, value.to_string());
            }
        }
        storage
    }

    pub fn get(&self, key: StorageKey) -> Option<String> {
        self.lock().get(&key).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<StorageKey, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DurableStorage for MemoryStorage {
    fn read(&self, key: StorageKey) -> Result<Option<String>> {
        Ok(self.get(key))
    }

    fn write(&self, key: StorageKey, value: &str) -> Result<()> {
        self.lock().insert(key, value.to_string());
        Ok(())
    }

    fn erase(&self, key: StorageKey) -> Result<()> {
        self.lock().remove(&key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_storage_roundtrip_and_erase() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let storage = FileStorage::new(dir.path().join("nested"));

        assert_eq!(storage.read(StorageKey::Token).unwrap(), None);

        storage.write(StorageKey::Token, "abc.def.ghi").unwrap();
        storage.write(StorageKey::User, r#"{"id":1}"#).unwrap();
        assert_eq!(storage.read(StorageKey::Token).unwrap().as_deref(), Some("abc.def.ghi"));
        assert!(dir.path().join("nested").join("user.json").exists());

        storage.erase(StorageKey::Token).unwrap();
        assert_eq!(storage.read(StorageKey::Token).unwrap(), None);
        assert!(storage.read(StorageKey::User).unwrap().is_some());
    }

    #[test]
    fn test_file_storage_erase_missing_is_ok() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let storage = FileStorage::new(dir.path());
        assert!(storage.erase(StorageKey::User).is_ok());
    }

    #[test]
    fn test_memory_storage_seeded() {
        let storage = MemoryStorage::with_entries([(StorageKey::Token, "t1")]);
        assert_eq!(storage.get(StorageKey::Token).as_deref(), Some("t1"));
        assert_eq!(storage.read(StorageKey::User).unwrap(), None);

        storage.erase(StorageKey::Token).unwrap();
        assert!(storage.is_empty());
    }
}
