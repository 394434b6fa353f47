//! Configuration types for aria-pool

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use url::Url;

/// Connection settings for the download engine
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// JSON-RPC endpoint (default: "http://127.0.0.1:6800/jsonrpc")
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// RPC secret, sent as `token:<secret>` (None = no authentication)
    #[serde(default)]
    pub secret: Option<String>,

    /// Per-request timeout (default: 10 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            secret: None,
            request_timeout: default_request_timeout(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate the endpoint
    pub fn endpoint_url(&self) -> Result<Url> {
        let url = Url::parse(&self.endpoint).map_err(|e| Error::Config {
            message: format!("invalid engine endpoint '{}': {}", self.endpoint, e),
            key: Some("engine.endpoint".to_string()),
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(Error::Config {
                message: format!("unsupported engine endpoint scheme '{other}'"),
                key: Some("engine.endpoint".to_string()),
            }),
        }
    }
}

/// Status polling intervals
///
/// Both schedules run only while a task is held by the engine (active,
/// waiting or paused).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Interval between `tellStatus` calls (default: 1 second)
    #[serde(default = "default_update_interval", with = "duration_serde")]
    pub update_interval: Duration,

    /// Interval between database syncs of byte counters (default: 60 seconds)
    ///
    /// Status transitions are always written immediately; this bounds how
    /// stale progress counters can be after a crash.
    #[serde(default = "default_sync_interval", with = "duration_serde")]
    pub sync_interval: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            update_interval: default_update_interval(),
            sync_interval: default_sync_interval(),
        }
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database path (default: "./aria-pool.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Category seeded into an empty database
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Display name
    pub name: String,

    /// Directory completed downloads of this category are saved to
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

/// Main configuration for a [`Pool`](crate::Pool)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Pool display name, also the name of its queue (default: "aria2")
    #[serde(default = "default_name")]
    pub name: String,

    /// Engine connection
    #[serde(default)]
    pub engine: EngineConfig,

    /// Polling intervals
    #[serde(default)]
    pub polling: PollingConfig,

    /// Data storage
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Categories created on first start (a single default category is
    /// created when this is empty)
    #[serde(default)]
    pub categories: Vec<CategoryConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: default_name(),
            engine: EngineConfig::default(),
            polling: PollingConfig::default(),
            persistence: PersistenceConfig::default(),
            categories: Vec::new(),
        }
    }
}

impl Config {
    /// Check settings that would otherwise fail later at runtime
    pub fn validate(&self) -> Result<()> {
        self.engine.endpoint_url()?;
        if self.polling.update_interval.is_zero() {
            return Err(Error::Config {
                message: "update interval must be greater than zero".to_string(),
                key: Some("polling.update_interval".to_string()),
            });
        }
        if self.polling.sync_interval.is_zero() {
            return Err(Error::Config {
                message: "sync interval must be greater than zero".to_string(),
                key: Some("polling.sync_interval".to_string()),
            });
        }
        Ok(())
    }

    /// Categories to seed, falling back to the default one
    pub(crate) fn seed_categories(&self) -> Vec<CategoryConfig> {
        if self.categories.is_empty() {
            vec![CategoryConfig {
                name: default_category_name(),
                directory: None,
            }]
        } else {
            self.categories.clone()
        }
    }
}

fn default_name() -> String {
    "aria2".to_string()
}

fn default_category_name() -> String {
    "Downloads".to_string()
}

fn default_endpoint() -> String {
    "http://127.0.0.1:6800/jsonrpc".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_update_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_sync_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./aria-pool.db")
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
