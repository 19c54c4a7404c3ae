//! Runtime configuration.
//!
//! Loaded from `~/.config/agendasync/config.toml` (or an explicit path) and
//! overlaid with `AGENDASYNC__SECTION__KEY` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_BROKER_RELATION, DEFAULT_CANCELLED_STATUS, DEFAULT_CLIENT_RELATION,
    DEFAULT_CREATOR_RELATION, DEFAULT_INTEGRATION_NAME, DEFAULT_INTERVAL_SECS,
    DEFAULT_WINDOW_DAYS,
};
use crate::error::{SyncError, SyncResult};

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub realworks: RealworksConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub sync: SyncSettings,
}

/// PostgREST endpoint holding the scheduling tables.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub url: String,
    pub service_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Agenda proxy in front of the CRM.
#[derive(Debug, Clone, Deserialize)]
pub struct RealworksConfig {
    pub url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl RealworksConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationConfig {
    /// Dispatcher endpoint; notifications are only logged when unset.
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Public site used for cancel/reschedule links.
    #[serde(default)]
    pub base_url: String,
}

/// Relation-type labels that identify parties on an agenda item.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RelationLabels {
    pub broker: String,
    pub creator: String,
    pub client: String,
}

impl Default for RelationLabels {
    fn default() -> Self {
        RelationLabels {
            broker: DEFAULT_BROKER_RELATION.to_string(),
            creator: DEFAULT_CREATOR_RELATION.to_string(),
            client: DEFAULT_CLIENT_RELATION.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub integration_name: String,
    pub batch_size: usize,
    pub window_days: i64,
    pub interval_secs: u64,
    pub cancelled_status: String,
    pub relations: RelationLabels,
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            integration_name: DEFAULT_INTEGRATION_NAME.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            window_days: DEFAULT_WINDOW_DAYS,
            interval_secs: DEFAULT_INTERVAL_SECS,
            cancelled_status: DEFAULT_CANCELLED_STATUS.to_string(),
            relations: RelationLabels::default(),
        }
    }
}

impl AppConfig {
    pub fn default_path() -> SyncResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| SyncError::Config("Could not determine config directory".into()))?
            .join("agendasync");

        Ok(config_dir.join("config.toml"))
    }

    /// Load from `path` (or the default location) plus the environment.
    pub fn load(path: Option<&Path>) -> SyncResult<Self> {
        let path = match path {
            Some(p) => PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).into_owned()),
            None => Self::default_path()?,
        };

        let config: AppConfig = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("AGENDASYNC")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .map_err(|e| SyncError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| SyncError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> SyncResult<()> {
        if self.sync.batch_size == 0 {
            return Err(SyncError::Config("sync.batch_size must be at least 1".into()));
        }
        if self.sync.window_days < 0 {
            return Err(SyncError::Config("sync.window_days must not be negative".into()));
        }
        Ok(())
    }
}
