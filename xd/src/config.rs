//! exportdesk configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main exportdesk configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Export backend connection
    pub api: ApiConfig,

    /// Status polling
    pub polling: PollingConfig,

    /// Retry budget
    pub retry: RetryConfig,

    /// Notification display
    pub notifications: NotificationConfig,

    /// Job list rendering
    pub view: ViewConfig,

    /// Where downloaded exports are written
    #[serde(rename = "download-dir")]
    pub download_dir: PathBuf,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            polling: PollingConfig::default(),
            retry: RetryConfig::default(),
            notifications: NotificationConfig::default(),
            view: ViewConfig::default(),
            download_dir: default_download_dir(),
            log_level: None,
        }
    }
}

fn default_download_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::default_paths() {
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

    /// Read just the log level, before logging is set up
    ///
    /// Errors are swallowed; the full load reports them once logging works.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let path = match config_path {
            Some(path) => Some(path.clone()),
            None => Self::default_paths().into_iter().find(|p| p.exists()),
        }?;
        Self::load_from_file(&path).ok().and_then(|c| c.log_level)
    }

    /// Project-local config first, then the user config directory
    fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".exportdesk.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("exportdesk").join("exportdesk.yml"));
        }
        paths
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Export backend connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Backend base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Environment variable holding the bearer token (optional)
    #[serde(rename = "token-env")]
    pub token_env: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            token_env: "EXPORTDESK_TOKEN".to_string(),
            timeout_ms: 30_000,
        }
    }
}

impl ApiConfig {
    /// Bearer token from the configured environment variable, if set
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env).ok().filter(|t| !t.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Status polling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Seconds between polling ticks
    #[serde(rename = "interval-secs")]
    pub interval_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_secs: 5 }
    }
}

impl PollingConfig {
    /// Get the poll interval as a Duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Retry budget
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts allowed per operation before it is terminally failed
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: crate::retry::DEFAULT_MAX_RETRIES,
        }
    }
}

/// Notification display
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// How long auto-dismissing notifications stay visible
    #[serde(rename = "duration-ms")]
    pub duration_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { duration_ms: 5_000 }
    }
}

impl NotificationConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Job list rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Row count above which only the visible window is rendered
    #[serde(rename = "virtualization-threshold")]
    pub virtualization_threshold: usize,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            virtualization_threshold: crate::view::DEFAULT_VIRTUALIZATION_THRESHOLD,
        }
    }
}
