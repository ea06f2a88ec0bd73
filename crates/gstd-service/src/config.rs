// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Daemon configuration and its storage port.
//!
//! Values live as JSON documents keyed by logical name. [`FsConfigStore`]
//! keeps them under the platform config directory (or an explicit one);
//! [`ConfigService`] does the (de)serialization.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use gstd_proto::wire::DEFAULT_MAX_LINE_BYTES;
use gstd_proto::{DEFAULT_ADDRESS, DEFAULT_PORT};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// Key under which [`DaemonConfig`] is stored.
pub const DAEMON_CONFIG_KEY: &str = "daemon";

/// Storage port for raw config blobs.
pub trait ConfigStore {
    /// Load a raw blob. Returns [`ConfigError::NotFound`] when missing.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Persist a raw blob.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Config failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Key not present in store.
    #[error("not found")]
    NotFound,
    /// I/O error while reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Document did not (de)serialize.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// No usable config directory.
    #[error("could not resolve config dir")]
    NoConfigDir,
}

/// Serializes values and delegates storage to a [`ConfigStore`].
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Service over `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: ConfigStore> ConfigService<S> {
    /// Load `key`. `Ok(None)` when missing or empty.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.store.load_raw(key) {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(ConfigError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Save `value` under `key`.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), ConfigError> {
        let data = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &data)
    }
}

/// JSON files in one directory, `<key>.json`.
#[derive(Debug, Clone)]
pub struct FsConfigStore {
    base: PathBuf,
}

impl FsConfigStore {
    /// Store in the platform config directory (e.g. `~/.config/gstd`).
    pub fn new() -> Result<Self, ConfigError> {
        let proj =
            ProjectDirs::from("dev", "flyingrobots", "gstd").ok_or(ConfigError::NoConfigDir)?;
        Self::at(proj.config_dir())
    }

    /// Store in `dir`, created if needed.
    pub fn at(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let base = dir.as_ref().to_path_buf();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base.join(format!("{key}.json"))
    }
}

impl ConfigStore for FsConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::NotFound),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        fs::write(self.path_for(key), data)?;
        Ok(())
    }
}

/// Daemon settings. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Address to bind.
    pub address: String,
    /// TCP port to bind.
    pub port: u16,
    /// Serve further commands on a connection after the first response.
    pub keep_connection_open: bool,
    /// Longest accepted command line in bytes.
    pub max_line_bytes: usize,
    /// Default tracing filter directive; `RUST_LOG` wins when set.
    pub log_filter: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            keep_connection_open: true,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            log_filter: "info".to_string(),
        }
    }
}

impl DaemonConfig {
    /// `address:port`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Load from `service`, writing defaults back once when the key is
    /// absent. Errors leave the defaults in place.
    pub fn load_or_default<S: ConfigStore>(
        service: &ConfigService<S>,
    ) -> (Self, Option<ConfigError>) {
        match service.load::<Self>(DAEMON_CONFIG_KEY) {
            Ok(Some(config)) => (config, None),
            Ok(None) => {
                let config = Self::default();
                let err = service.save(DAEMON_CONFIG_KEY, &config).err();
                (config, err)
            }
            Err(err) => (Self::default(), Some(err)),
        }
    }
}
