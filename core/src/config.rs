//! Session configuration loading
//!
//! Loads configuration from `~/.config/spectrum-explorer/config.toml` (or the
//! `SPECTRUM_EXPLORER_CONFIG` env var). Every field has a default, so an
//! absent file is not an error.

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use chrono::FixedOffset;
use serde::Deserialize;

use crate::error::Result;
use crate::error::SpectrumError;

/// Root configuration
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct SpectrumConfig {
    /// Mining backend connection
    #[serde(default)]
    pub backend: BackendConfig,

    /// User notice behaviour
    #[serde(default)]
    pub notices: NoticeConfig,

    /// Defaults for filter widgets
    #[serde(default)]
    pub filters: FilterDefaults,

    /// Payload derivation
    #[serde(default)]
    pub payload: PayloadConfig,
}

/// Mining backend connection settings
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BackendConfig {
    /// Base URL the `/api/...` paths are joined to
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout; 0 disables it
    #[serde(default)]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: 0,
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct NoticeConfig {
    /// How long a notice stays visible
    #[serde(default = "default_dismiss_after_ms")]
    pub dismiss_after_ms: u64,
}

fn default_dismiss_after_ms() -> u64 {
    5000
}

impl Default for NoticeConfig {
    fn default() -> Self {
        Self {
            dismiss_after_ms: default_dismiss_after_ms(),
        }
    }
}

impl NoticeConfig {
    pub fn dismiss_after(&self) -> Duration {
        Duration::from_millis(self.dismiss_after_ms)
    }
}

/// Values the clustering widget shows while no clustering filter is set
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct FilterDefaults {
    #[serde(default = "default_clustering_epsilon")]
    pub clustering_epsilon: f64,

    #[serde(default = "default_clustering_min_samples")]
    pub clustering_min_samples: u32,
}

fn default_clustering_epsilon() -> f64 {
    10.0
}

fn default_clustering_min_samples() -> u32 {
    20
}

impl Default for FilterDefaults {
    fn default() -> Self {
        Self {
            clustering_epsilon: default_clustering_epsilon(),
            clustering_min_samples: default_clustering_min_samples(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct PayloadConfig {
    /// Offset used to turn calendar dates into instants
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl PayloadConfig {
    pub fn offset(&self) -> Result<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                SpectrumError::config(format!(
                    "utc_offset_minutes {} is out of range",
                    self.utc_offset_minutes
                ))
            })
    }
}

impl SpectrumConfig {
    /// Environment variable for config path override
    pub const ENV_CONFIG_PATH: &'static str = "SPECTRUM_EXPLORER_CONFIG";

    /// Default config filename
    pub const DEFAULT_CONFIG_FILENAME: &'static str = "config.toml";

    /// Load configuration from file
    ///
    /// Resolution order:
    /// 1. `SPECTRUM_EXPLORER_CONFIG` environment variable
    /// 2. `~/.config/spectrum-explorer/config.toml`
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let path = Self::resolve_config_path();

        if !path.exists() {
            tracing::info!(
                path = %path.display(),
                "spectrum config not found, using defaults"
            );
            return Ok(Self::default());
        }

        Self::load_from_path(&path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SpectrumError::config_with_source(
                format!("failed to read config at {}", path.display()),
                e,
            )
        })?;

        Self::parse(&contents)
    }

    /// Parse configuration from TOML string
    pub fn parse(contents: &str) -> Result<Self> {
        let cfg: SpectrumConfig = toml::from_str(contents)
            .map_err(|e| SpectrumError::config_with_source("failed to parse config", e))?;

        cfg.validate()?;
        Ok(cfg)
    }

    fn resolve_config_path() -> PathBuf {
        if let Ok(path) = std::env::var(Self::ENV_CONFIG_PATH) {
            return PathBuf::from(path);
        }

        dirs::home_dir()
            .map(|h| {
                h.join(".config")
                    .join("spectrum-explorer")
                    .join(Self::DEFAULT_CONFIG_FILENAME)
            })
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_CONFIG_FILENAME))
    }

    fn validate(&self) -> Result<()> {
        if self.backend.base_url.trim().is_empty() {
            return Err(SpectrumError::config("backend.base_url must not be empty"));
        }

        self.payload.offset()?;

        if self.filters.clustering_epsilon <= 0.0 {
            tracing::warn!(
                epsilon = self.filters.clustering_epsilon,
                "non-positive default clustering epsilon"
            );
        }

        if self.notices.dismiss_after_ms == 0 {
            tracing::warn!("notices.dismiss_after_ms is 0; notices will never be visible");
        }

        Ok(())
    }
}
