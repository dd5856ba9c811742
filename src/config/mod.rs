//! Configuration management for scanfold

pub mod schema;

pub use schema::{CacheBackend, Config};

use crate::error::{ScanfoldError, ScanfoldResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scanfold")
            .join("config.toml")
    }

    /// Load and validate configuration; a missing file yields defaults
    pub async fn load(&self) -> ScanfoldResult<Config> {
        let config = if self.config_path.exists() {
            self.load_from_file(&self.config_path).await?
        } else {
            debug!("Config file not found, using defaults");
            Config::default()
        };

        self.validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> ScanfoldResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| ScanfoldError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| ScanfoldError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Reject settings that would only fail later, mid-scan
    pub fn validate(&self, config: &Config) -> ScanfoldResult<()> {
        let invalid = |reason: String| ScanfoldError::ConfigInvalid {
            path: self.config_path.clone(),
            reason,
        };

        match config.general.log_format.as_str() {
            "text" | "json" => {}
            other => {
                return Err(invalid(format!(
                    "general.log_format must be \"text\" or \"json\", got \"{}\"",
                    other
                )))
            }
        }

        config
            .report
            .write_options()
            .map_err(|e| invalid(format!("report: {}", e)))?;

        for name in config.remote.headers.keys() {
            if name.trim().is_empty() || name.contains(':') {
                return Err(invalid(format!("remote.headers: invalid header name \"{}\"", name)));
            }
        }

        if config.cache.backend == CacheBackend::Remote
            && config.cache.remote_url.is_none()
            && config.remote.url.is_none()
        {
            return Err(invalid(
                "cache.backend = \"remote\" needs cache.remote_url or remote.url".to_string(),
            ));
        }

        Ok(())
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> ScanfoldResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            ScanfoldError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> ScanfoldResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ScanfoldError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
