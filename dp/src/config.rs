//! dashpoll configuration types and loading

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::panels::PanelConfig;
use crate::polling::PollingConfig;

/// Main dashpoll configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Shared refresh timer settings
    pub polling: PollingConfig,

    /// Panels polled by `dp run`
    pub panels: Vec<PanelConfig>,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if self.polling.interval_ms == 0 {
            return Err(eyre::eyre!("polling.interval-ms must be greater than zero"));
        }

        let mut seen = HashSet::new();
        for panel in &self.panels {
            if !seen.insert(panel.id.as_str()) {
                return Err(eyre::eyre!("Duplicate panel id: {}", panel.id));
            }
            reqwest::Url::parse(&panel.url).context(format!("Invalid url for panel {}", panel.id))?;
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    ///
    /// Explicit path, then `./.dashpoll.yml`, then
    /// `~/.config/dashpoll/dashpoll.yml`, then defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
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

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read just the log level, before logging is set up
    ///
    /// Errors are swallowed; the full load reports them later.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let path = match config_path {
            Some(path) => path.clone(),
            None => Self::candidates().into_iter().find(|p| p.exists())?,
        };
        Self::load_from_file(path).ok()?.log_level
    }

    fn candidates() -> Vec<PathBuf> {
        let mut candidates = vec![PathBuf::from(".dashpoll.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("dashpoll").join("dashpoll.yml"));
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
