//! Life planner configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const LOCAL_CONFIG: &str = ".lifeplanner.yml";
const APP_DIR: &str = "lifeplanner";

/// Main life planner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Storage locations
    pub storage: StorageConfig,

    /// Planner flow behaviour
    pub flow: FlowConfig,

    /// Remote mirror queue
    pub sync: SyncConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::candidates() {
            if candidate.exists() {
                match Self::load_from_file(&candidate) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", candidate.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Errors are swallowed; a broken config is reported later by [`Config::load`].
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let path = match config_path {
            Some(path) => path.clone(),
            None => Self::candidates().into_iter().find(|p| p.exists())?,
        };
        let content = fs::read_to_string(path).ok()?;
        let config: Self = serde_yaml::from_str(&content).ok()?;
        config.log_level
    }

    /// Project-local config, then user config
    fn candidates() -> Vec<PathBuf> {
        let mut candidates = vec![PathBuf::from(LOCAL_CONFIG)];
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join(APP_DIR).join("lifeplanner.yml"));
        }
        candidates
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

fn data_path(file: &str) -> String {
    // XDG data directory (~/.local/share/lifeplanner on Linux)
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".lifeplanner"))
        .join(file)
        .to_string_lossy()
        .into_owned()
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file backing the remote store
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Local goal score cache
    #[serde(rename = "goal-cache-path")]
    pub goal_cache_path: String,

    /// Signed-in identity between invocations
    #[serde(rename = "session-path")]
    pub session_path: String,

    /// When false the planner runs local-only
    #[serde(rename = "remote-enabled")]
    pub remote_enabled: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: data_path("planner.db"),
            goal_cache_path: data_path("goal-scores.json"),
            session_path: data_path("session.json"),
            remote_enabled: true,
        }
    }
}

/// Planner flow configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Persist and restore the current step per user
    #[serde(rename = "resume-position")]
    pub resume_position: bool,

    /// YAML catalog replacing the built-in steps
    #[serde(rename = "catalog-path")]
    pub catalog_path: Option<String>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            resume_position: true,
            catalog_path: None,
        }
    }
}

/// Sync queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Pending remote tasks before enqueue is rejected
    #[serde(rename = "queue-capacity")]
    pub queue_capacity: usize,

    /// How long a notice stays visible
    #[serde(rename = "notice-ttl-ms")]
    pub notice_ttl_ms: u64,
}

impl SyncConfig {
    pub fn notice_ttl(&self) -> Duration {
        Duration::from_millis(self.notice_ttl_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            notice_ttl_ms: 3000,
        }
    }
}
