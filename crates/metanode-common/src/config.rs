//! Configuration types for the metanode store
//!
//! This module defines configuration structures consumed when the store
//! is opened. Values normally come from a TOML file with CLI overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default page-cache size for the embedded store (64 MiB)
pub const DEFAULT_CACHE_SIZE: usize = 64 * 1024 * 1024;

/// Default write-buffer size (4 MiB)
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Root configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Metadata store configuration
    #[serde(default)]
    pub store: StoreConfig,
}

/// Storage configuration for one metadata partition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the embedded store
    pub data_dir: PathBuf,
    /// Page-cache size in bytes
    pub cache_size: usize,
    /// Bytes allowed in non-durable commits before a durable commit is forced
    pub write_buffer_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/metanode"),
            cache_size: DEFAULT_CACHE_SIZE,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
        }
    }
}

impl StoreConfig {
    /// Replace the data directory, keeping the configured sizes
    #[must_use]
    pub fn with_data_dir(self, data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store.cache_size, DEFAULT_CACHE_SIZE);
        assert_eq!(config.store.write_buffer_size, 4 * 1024 * 1024);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [store]
            data_dir = "/tmp/meta"
            "#,
        )
        .unwrap();
        assert_eq!(config.store.data_dir, PathBuf::from("/tmp/meta"));
        assert_eq!(config.store.cache_size, DEFAULT_CACHE_SIZE);
    }

    #[test]
    fn test_with_data_dir() {
        let config = StoreConfig {
            write_buffer_size: 1024,
            ..Default::default()
        }
        .with_data_dir("/data/mp1");
        assert_eq!(config.data_dir, PathBuf::from("/data/mp1"));
        assert_eq!(config.write_buffer_size, 1024);
        assert_eq!(config.cache_size, DEFAULT_CACHE_SIZE);
    }
}
