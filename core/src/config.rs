// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{ConfigError, StoreError, StoreResult};
use crate::localdb::SqliteCache;
use crate::memory::MemoryStore;
use crate::store::CacheStore;

/// The name of the application, used for the state directory.
pub const APP_NAME: &str = "calsync";

/// File name of the on-disk cache inside the state directory.
const CACHE_FILE_NAME: &str = "cache.sqlite";

/// Configuration for a cached calendar.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct Config {
    /// Directory for storing the cache database.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,

    /// Which kind of local cache to use.
    #[serde(default)]
    pub cache_type: CacheType,

    /// Always report the cache as enabled, regardless of the remote store.
    #[serde(default)]
    pub cache_always: bool,

    /// A disabled calendar never synchronizes.
    #[serde(default)]
    pub disabled: bool,
}

/// Kind of local cache store.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    /// SQLite database in the state directory.
    #[default]
    Storage,

    /// Volatile in-memory cache.
    Memory,
}

impl Config {
    /// Normalize the configuration.
    pub fn normalize(&mut self) -> Result<(), ConfigError> {
        match &self.state_dir {
            Some(a) => self.state_dir = Some(expand_path(a)?),
            None => match get_state_dir() {
                Ok(a) => self.state_dir = Some(a.join(APP_NAME)),
                Err(e) => tracing::warn!(err = %e, "failed to get state directory"),
            },
        };

        Ok(())
    }

    /// Path of the cache database, if the cache lives on disk.
    pub fn cache_path(&self) -> Option<PathBuf> {
        match self.cache_type {
            CacheType::Storage => self.state_dir.as_ref().map(|a| a.join(CACHE_FILE_NAME)),
            CacheType::Memory => None,
        }
    }

    /// Opens the configured local cache store for a calendar.
    pub async fn open_cache(&self, calendar_id: &str) -> StoreResult<Arc<dyn CacheStore>> {
        match self.cache_type {
            CacheType::Storage => {
                if let Some(dir) = &self.state_dir {
                    tracing::debug!(path = %dir.display(), "ensuring state directory exists");
                    tokio::fs::create_dir_all(dir)
                        .await
                        .map_err(|e| StoreError::Storage(e.to_string()))?;
                }
                let cache = SqliteCache::open(self.cache_path().as_deref(), calendar_id).await?;
                Ok(Arc::new(cache))
            }
            CacheType::Memory => Ok(Arc::new(MemoryStore::new(calendar_id))),
        }
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

/// Handle tilde (~) and environment variables in the path
fn expand_path(path: &Path) -> Result<PathBuf, ConfigError> {
    if path.is_absolute() {
        return Ok(path.to_owned());
    }

    let path = path
        .to_str()
        .ok_or_else(|| ConfigError::Path(path.display().to_string()))?;

    let home_prefixes: &[&str] = if cfg!(unix) {
        &["~/", "$HOME/", "${HOME}/"]
    } else {
        &[r"~\", "~/", r"%UserProfile%\", r"%UserProfile%/"]
    };
    for prefix in home_prefixes {
        if let Some(stripped) = path.strip_prefix(prefix) {
            let home = dirs::home_dir()
                .ok_or_else(|| ConfigError::Path("home directory not found".into()))?;
            return Ok(home.join(stripped));
        }
    }

    let config_prefixes: &[&str] = if cfg!(unix) {
        &["$XDG_CONFIG_HOME/", "${XDG_CONFIG_HOME}/"]
    } else {
        &[r"%LOCALAPPDATA%\", "%LOCALAPPDATA%/"]
    };
    for prefix in config_prefixes {
        if let Some(stripped) = path.strip_prefix(prefix) {
            return Ok(get_config_dir()?.join(stripped));
        }
    }

    Ok(path.into())
}

fn get_config_dir() -> Result<PathBuf, ConfigError> {
    #[cfg(unix)]
    let config_dir = xdg::BaseDirectories::new().get_config_home();
    #[cfg(windows)]
    let config_dir = dirs::config_dir();
    config_dir.ok_or_else(|| ConfigError::Path("config directory not found".into()))
}

fn get_state_dir() -> Result<PathBuf, ConfigError> {
    #[cfg(unix)]
    let state_dir = xdg::BaseDirectories::new().get_state_home();
    #[cfg(windows)]
    let state_dir = dirs::data_dir();
    state_dir.ok_or_else(|| ConfigError::Path("state directory not found".into()))
}
