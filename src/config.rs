//! Optional `symdex.toml` configuration.
//!
//! ```toml
//! [build]
//! target_shard_size = 256
//! codec = "json"
//!
//! [query]
//! result_limit = 50
//! fetch_timeout_ms = 2000
//! ```
//!
//! Every field is optional. Command-line flags override file values.

use crate::error::ConfigError;
use crate::index::Codec;
use crate::search::DEFAULT_RESULT_LIMIT;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up in the working directory when none is given.
pub const CONFIG_FILE: &str = "symdex.toml";

pub const DEFAULT_TARGET_SHARD_SIZE: usize = 256;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub build: BuildConfig,
    pub query: QueryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    pub target_shard_size: usize,
    pub codec: Codec,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            target_shard_size: DEFAULT_TARGET_SHARD_SIZE,
            codec: Codec::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryConfig {
    pub result_limit: usize,
    /// Per-shard load deadline; unset means wait indefinitely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_timeout_ms: Option<u64>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            result_limit: DEFAULT_RESULT_LIMIT,
            fetch_timeout_ms: None,
        }
    }
}

impl QueryConfig {
    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_ms.map(Duration::from_millis)
    }
}

impl Config {
    /// Parses and validates config text. `path` is only used in errors.
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let config = Self::from_toml(&text, path)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Loads `explicit` if given (it must exist), else `./symdex.toml` if present,
    /// else the defaults.
    pub async fn discover(explicit: Option<&str>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(&PathBuf::from(expand_tilde(path).as_ref())).await;
        }

        let local = Path::new(CONFIG_FILE);
        if tokio::fs::try_exists(local).await.unwrap_or(false) {
            Self::load(local).await
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.build.target_shard_size == 0 {
            return Err(ConfigError::Invalid(
                "build.target_shard_size must be at least 1".to_string(),
            ));
        }
        if self.query.result_limit == 0 {
            return Err(ConfigError::Invalid(
                "query.result_limit must be at least 1".to_string(),
            ));
        }
        if self.query.fetch_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "query.fetch_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expands tilde (`~`) in a path to the user's home directory.
///
/// - `~/foo` becomes `/home/user/foo`
/// - `~` becomes `/home/user`
/// - Other paths are returned unchanged
pub fn expand_tilde(path: &str) -> Cow<'_, str> {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return Cow::Owned(home.join(stripped).display().to_string());
        }
    } else if path == "~"
        && let Some(home) = dirs::home_dir()
    {
        return Cow::Owned(home.display().to_string());
    }
    Cow::Borrowed(path)
}
