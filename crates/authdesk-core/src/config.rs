//! Application configuration management.
//!
//! Configuration is stored at `~/.config/authdesk/config.json`. A few values
//! can be overridden from the environment (or a `.env` file loaded by the
//! binary):
//! - `AUTHDESK_API_BASE_URL`: API root, e.g. `https://auth.example.com/api/v1`
//! - `AUTHDESK_STORAGE`: `file`, `keyring` or `memory`
//! - `AUTHDESK_DATA_DIR`: directory for the file storage backend and logs

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::api::DEFAULT_BASE_URL;
use crate::auth::{DurableStorage, FileStorage, KeyringStorage, MemoryStorage};

/// Application name used for config/data directory paths
const APP_NAME: &str = "authdesk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const ENV_API_BASE_URL: &str = "AUTHDESK_API_BASE_URL";
pub const ENV_STORAGE: &str = "AUTHDESK_STORAGE";
pub const ENV_DATA_DIR: &str = "AUTHDESK_DATA_DIR";

/// Where the session's token and user record are kept between runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Files in the data directory
    #[default]
    File,
    /// OS keychain
    Keyring,
    /// Nothing survives the process
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StorageBackend::File),
            "keyring" => Ok(StorageBackend::Keyring),
            "memory" => Ok(StorageBackend::Memory),
            other => bail!("Unknown storage backend '{}' (expected file, keyring or memory)", other),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::File => write!(f, "file"),
            StorageBackend::Keyring => write!(f, "keyring"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub storage: StorageBackend,
    pub last_username: Option<String>,
    pub data_dir: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// API root: environment, then config file, then the local default.
    pub fn api_base_url(&self) -> Result<Url> {
        self.api_base_url_with(std::env::var(ENV_API_BASE_URL).ok())
    }

    fn api_base_url_with(&self, env: Option<String>) -> Result<Url> {
        let raw = env
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.api_base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let url = Url::parse(raw.trim()).with_context(|| format!("Invalid API base URL '{}'", raw))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("API base URL must use http or https, got '{}'", url.scheme());
        }
        Ok(url)
    }

    pub fn storage_backend(&self) -> Result<StorageBackend> {
        self.storage_backend_with(std::env::var(ENV_STORAGE).ok())
    }

    fn storage_backend_with(&self, env: Option<String>) -> Result<StorageBackend> {
        match env.filter(|v| !v.trim().is_empty()) {
            Some(value) => value.parse().with_context(|| format!("Invalid {}", ENV_STORAGE)),
            None => Ok(self.storage),
        }
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        self.data_dir_with(std::env::var_os(ENV_DATA_DIR).map(PathBuf::from))
    }

    fn data_dir_with(&self, env: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(dir) = env.filter(|d| !d.as_os_str().is_empty()) {
            return Ok(dir);
        }
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Open the configured durable storage for the session store
    pub fn open_storage(&self) -> Result<Arc<dyn DurableStorage>> {
        let storage: Arc<dyn DurableStorage> = match self.storage_backend()? {
            StorageBackend::File => Arc::new(FileStorage::new(self.data_dir()?)),
            StorageBackend::Keyring => Arc::new(KeyringStorage::default()),
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
        };
        Ok(storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.storage, StorageBackend::File);
        assert_eq!(config.api_base_url, None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            api_base_url: Some("https://auth.example.com/api/v1".to_string()),
            storage: StorageBackend::Keyring,
            last_username: Some("ana@example.com".to_string()),
            data_dir: None,
        };
        config.save_to(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains(r#""storage": "keyring""#));

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.storage, StorageBackend::Keyring);
        assert_eq!(loaded.last_username.as_deref(), Some("ana@example.com"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"last_username": "bo@example.com"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.storage, StorageBackend::File);
        assert_eq!(config.last_username.as_deref(), Some("bo@example.com"));
    }

    #[test]
    fn test_base_url_precedence() {
        let mut config = Config::default();
        assert_eq!(config.api_base_url_with(None).unwrap().as_str(), DEFAULT_BASE_URL);

        config.api_base_url = Some("https://file.example.com/api/v1".to_string());
        assert_eq!(
            config.api_base_url_with(None).unwrap().as_str(),
            "https://file.example.com/api/v1"
        );

        let from_env = config
            .api_base_url_with(Some("https://env.example.com/api/v1".to_string()))
            .unwrap();
        assert_eq!(from_env.host_str(), Some("env.example.com"));

        // Blank env values are ignored
        let blank = config.api_base_url_with(Some("  ".to_string())).unwrap();
        assert_eq!(blank.host_str(), Some("file.example.com"));
    }

    #[test]
    fn test_base_url_rejects_bad_values() {
        let config = Config::default();
        assert!(config.api_base_url_with(Some("not a url".to_string())).is_err());
        assert!(config.api_base_url_with(Some("ftp://example.com".to_string())).is_err());
    }

    #[test]
    fn test_storage_backend_override() {
        let config = Config::default();
        assert_eq!(config.storage_backend_with(None).unwrap(), StorageBackend::File);
        assert_eq!(
            config.storage_backend_with(Some("Keyring".to_string())).unwrap(),
            StorageBackend::Keyring
        );
        assert!(config.storage_backend_with(Some("floppy".to_string())).is_err());
    }

    #[test]
    fn test_data_dir_precedence() {
        let mut config = Config {
            data_dir: Some(PathBuf::from("/var/lib/authdesk")),
            ..Default::default()
        };
        assert_eq!(
            config.data_dir_with(Some(PathBuf::from("/tmp/override"))).unwrap(),
            PathBuf::from("/tmp/override")
        );
        assert_eq!(config.data_dir_with(None).unwrap(), PathBuf::from("/var/lib/authdesk"));

        config.data_dir = None;
        if let Ok(dir) = config.data_dir_with(None) {
            assert!(dir.ends_with(APP_NAME));
        }
    }
}
