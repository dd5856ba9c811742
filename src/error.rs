//! Error types for scanfold
//!
//! All modules use `ScanfoldResult<T>` as their return type.

use crate::rpc::RpcError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for scanfold operations
pub type ScanfoldResult<T> = Result<T, ScanfoldError>;

/// Why an in-flight call was aborted by its caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The cancellation token was triggered
    Cancelled,
    /// The caller-supplied deadline passed
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "cancelled"),
            Self::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

/// All errors that can occur in scanfold
#[derive(Error, Debug)]
pub enum ScanfoldError {
    // Cache errors
    #[error("Cache backend {backend} unavailable: {reason}")]
    CacheUnavailable { backend: String, reason: String },

    #[error("Corrupt cache entry {key}: {reason}")]
    CacheCorrupt { key: String, reason: String },

    #[error("Invalid cache key \"{0}\"")]
    InvalidCacheKey(String),

    #[error("Local scans need the fs or memory cache backend, not {0}")]
    LocalCacheRequired(String),

    // Dispatch errors
    #[error("Failed to scan {target} via remote server after {attempts} attempt(s): {source}")]
    DispatchFailed {
        target: String,
        attempts: u32,
        #[source]
        source: RpcError,
    },

    #[error("Scan of {target} {reason}")]
    Cancelled { target: String, reason: CancelReason },

    // Analysis errors
    #[error("Failed to analyze blob {key}: {reason}")]
    Analysis { key: String, reason: String },

    #[error("Vulnerability detection failed for {target}: {reason}")]
    Detection { target: String, reason: String },

    #[error("Blob {0} is not in the cache")]
    BlobNotFound(String),

    // Report errors
    #[error("Unknown format \"{0}\". Use \"json\" or \"table\"")]
    UnknownFormat(String),

    #[error("Unknown report type \"{0}\". Use \"all\" or \"summary\"")]
    UnknownReport(String),

    #[error("Unknown severity \"{0}\"")]
    UnknownSeverity(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Remote server URL is not configured")]
    RemoteNotConfigured,

    #[error("Invalid header \"{0}\". Expected format: Name: value")]
    InvalidHeader(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScanfoldError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a cache-unavailable error for the named backend
    pub fn cache_unavailable(backend: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::CacheUnavailable {
            backend: backend.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error means the cache backend could not be reached
    pub fn is_cache_unavailable(&self) -> bool {
        matches!(self, Self::CacheUnavailable { .. })
    }

    /// Whether the error was caused by caller cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::CacheUnavailable { .. } => true,
            Self::DispatchFailed { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::UnknownFormat(_) => Some("Use --format table or --format json"),
            Self::UnknownReport(_) => Some("Use --report all or --report summary"),
            Self::UnknownSeverity(_) => {
                Some("Valid severities: UNKNOWN, LOW, MEDIUM, HIGH, CRITICAL")
            }
            Self::RemoteNotConfigured => Some("Pass --remote or set [remote] url in config"),
            Self::LocalCacheRequired(_) => {
                Some("Use `scanfold client` for remote caches, or pass --cache-backend fs")
            }
            Self::DispatchFailed { .. } => Some("Check that the scan server is reachable"),
            _ => None,
        }
    }
}
