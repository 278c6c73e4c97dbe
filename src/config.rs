// ⚙️ Configuration - JSON file + environment overrides
//
// Precedence: defaults < config file < environment.

use crate::catalog::GROUPS;
use crate::error::ConfigError;
use crate::ownership::{OwnershipStore, CHANNELS, STORE_KEY};
use crate::store::{JsonFileStore, SqliteStore};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_CONFIG: &str = "COLLECTION_CONFIG";
pub const ENV_DATA_DIR: &str = "COLLECTION_DATA_DIR";
pub const ENV_STORE_PATH: &str = "COLLECTION_STORE_PATH";
pub const ENV_SERVER_ADDR: &str = "COLLECTION_SERVER_ADDR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding one data file per partition
    pub data_dir: PathBuf,

    /// Partition labels, in load order
    pub partitions: Vec<String>,

    /// Acquisition channels tracked per entry
    pub channels: Vec<String>,

    pub store: StoreBackend,
    pub store_path: PathBuf,
    pub store_key: String,

    /// Per-partition fetch limit; none means wait indefinitely
    pub partition_timeout_secs: Option<u64>,

    pub server_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("data"),
            partitions: GROUPS.iter().map(|g| g.to_string()).collect(),
            channels: CHANNELS.iter().map(|c| c.to_string()).collect(),
            store: StoreBackend::Sqlite,
            store_path: PathBuf::from("collection.db"),
            store_key: STORE_KEY.to_string(),
            partition_timeout_secs: None,
            server_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl Config {
    /// Load from `path` (or `$COLLECTION_CONFIG`), then apply env overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var_os(ENV_CONFIG).map(PathBuf::from);
        let path = path.map(Path::to_path_buf).or(env_path);

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Config::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply overrides from an environment lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup(ENV_STORE_PATH) {
            self.store_path = PathBuf::from(path);
        }
        if let Some(addr) = lookup(ENV_SERVER_ADDR) {
            self.server_addr = addr;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.partitions.is_empty() {
            return Err(ConfigError::Invalid("at least one partition is required".to_string()));
        }
        if self.channels.is_empty() {
            return Err(ConfigError::Invalid("at least one channel is required".to_string()));
        }
        if self.store_key.trim().is_empty() {
            return Err(ConfigError::Invalid("store_key must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn partition_timeout(&self) -> Option<Duration> {
        self.partition_timeout_secs.map(Duration::from_secs)
    }

    /// Open the configured ownership store
    pub fn open_store(&self) -> anyhow::Result<Box<dyn OwnershipStore>> {
        let store: Box<dyn OwnershipStore> = match self.store {
            StoreBackend::Sqlite => Box::new(SqliteStore::open(&self.store_path, &self.store_key)?),
            StoreBackend::Json => Box::new(JsonFileStore::new(&self.store_path)),
        };
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_cover_every_group() {
        let config = Config::default();
        assert_eq!(config.partitions, vec!["Bakuten", "MFB", "Burst", "X"]);
        assert_eq!(config.channels, vec!["Hasbro", "Takara"]);
        assert_eq!(config.store_key, "ownedBeys");
        assert_eq!(config.partition_timeout(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"data_dir": "/srv/beys", "store": "json", "partition_timeout_secs": 5}"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/beys"));
        assert_eq!(config.store, StoreBackend::Json);
        assert_eq!(config.partition_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.partitions.len(), 4);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_DATA_DIR, "/tmp/data"),
            (ENV_SERVER_ADDR, "127.0.0.1:8080"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.data_dir, PathBuf::from("/tmp/data"));
        assert_eq!(config.server_addr, "127.0.0.1:8080");
        assert_eq!(config.store_path, PathBuf::from("collection.db"));
    }

    #[test]
    fn test_invalid_config() {
        let mut config = Config::default();
        config.partitions.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Config::from_file(&path), Err(ConfigError::Parse { .. })));
        assert!(matches!(
            Config::from_file(&dir.path().join("missing.json")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_open_json_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            store: StoreBackend::Json,
            store_path: dir.path().join("owned.json"),
            ..Config::default()
        };

        let mut store = config.open_store().unwrap();
        assert!(store.load().unwrap().is_empty());
    }
}
