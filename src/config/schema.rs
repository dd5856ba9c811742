//! Configuration schema for scanfold
//!
//! Configuration is stored at `~/.config/scanfold/config.toml`

use crate::report::{Format, ReportKind, WriteOptions};
use crate::rpc::{CustomHeaders, RetryPolicy, TransportOptions};
use crate::types::Severity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Analysis cache settings
    pub cache: CacheConfig,

    /// Remote scan server settings
    pub remote: RemoteConfig,

    /// Report rendering defaults
    pub report: ReportConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Where analysis results are cached
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Fs,
    Memory,
    Remote,
}

impl CacheBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fs => "fs",
            Self::Memory => "memory",
            Self::Remote => "remote",
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,

    /// Cache directory (defaults to the platform cache dir)
    pub dir: Option<PathBuf>,

    /// Cache server URL when `backend = "remote"`; falls back to `[remote] url`
    pub remote_url: Option<String>,
}

impl CacheConfig {
    /// Resolved cache directory
    pub fn dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("scanfold")
        })
    }
}

/// Remote scan server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Server base URL, e.g. `http://scanner.internal:4954`
    pub url: Option<String>,

    /// Skip TLS certificate verification
    pub insecure: bool,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Total attempts per request, including the first
    pub max_attempts: u32,

    pub initial_backoff_ms: u64,

    pub max_backoff_ms: u64,

    /// Extra headers sent with every request
    pub headers: BTreeMap<String, String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: None,
            insecure: false,
            timeout_secs: 300,
            max_attempts: 10,
            initial_backoff_ms: 500,
            max_backoff_ms: 60_000,
            headers: BTreeMap::new(),
        }
    }
}

impl RemoteConfig {
    pub fn transport(&self) -> TransportOptions {
        TransportOptions {
            insecure: self.insecure,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_interval: Duration::from_millis(self.initial_backoff_ms),
            max_interval: Duration::from_millis(self.max_backoff_ms),
            ..RetryPolicy::default()
        }
    }

    pub fn custom_headers(&self) -> CustomHeaders {
        CustomHeaders::from(&self.headers)
    }
}

/// Report rendering defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// "table" or "json"
    pub format: String,

    /// "all" or "summary"
    pub report: String,

    /// Comma-separated severities to count
    pub severities: String,

    pub dependency_tree: bool,

    pub include_non_failures: bool,

    pub trace: bool,

    pub list_all_packages: bool,

    /// Exit code used when findings breach the failure threshold
    pub exit_code: u8,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: "table".to_string(),
            report: "all".to_string(),
            severities: "UNKNOWN,LOW,MEDIUM,HIGH,CRITICAL".to_string(),
            dependency_tree: false,
            include_non_failures: false,
            trace: false,
            list_all_packages: false,
            exit_code: 0,
        }
    }
}

impl ReportConfig {
    /// Writer options, failing on unknown format, report or severity names
    pub fn write_options(&self) -> crate::error::ScanfoldResult<WriteOptions> {
        Ok(WriteOptions {
            format: self.format.parse::<Format>()?,
            report: self.report.parse::<ReportKind>()?,
            severities: Severity::parse_list(&self.severities)?,
            dependency_tree: self.dependency_tree,
            include_non_failures: self.include_non_failures,
            trace: self.trace,
            colorize: false,
        })
    }
}
