//! Remote scanning protocol
//!
//! Ships scan requests to a scan server as JSON over HTTP and recovers from
//! transient network failure with bounded retries.
//!
//! - [`wire`]: request/response bodies with stable field names
//! - [`http`]: blocking `ureq` agent run off the async runtime
//! - [`retry`]: backoff policy and cancellation context
//! - [`client`]: the [`RemoteScanner`] driver

pub mod client;
pub mod http;
pub mod retry;
pub mod wire;

pub use client::{RemoteScanner, ScanTransport};
pub use http::{HttpClient, TransportOptions};
pub use retry::{DispatchContext, RetryPolicy};

use crate::error::{ScanfoldError, ScanfoldResult};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Failure of a single request to the scan server
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// Network failure, timeout, or the server reported itself unavailable
    #[error("transport error: {0}")]
    Transport(String),

    /// The server rejected the request
    #[error("server rejected request (HTTP {status}): {message}")]
    Application { status: u16, message: String },

    /// The request could not be sent and resending will not help: bad URL,
    /// TLS rejection, invalid proxy
    #[error("request could not be sent: {0}")]
    Request(String),

    /// The response body could not be decoded
    #[error("malformed response: {0}")]
    Decode(String),

    /// The request body could not be encoded
    #[error("failed to encode request: {0}")]
    Encode(String),
}

impl RpcError {
    /// Only transport failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Extra HTTP headers attached to every request of one client
///
/// Headers travel with each call; nothing process-wide is modified.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CustomHeaders(Vec<(String, String)>);

impl CustomHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// Parse a `Name: value` pair
    pub fn parse_pair(raw: &str) -> ScanfoldResult<(String, String)> {
        let (name, value) = raw
            .split_once(':')
            .ok_or_else(|| ScanfoldError::InvalidHeader(raw.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ScanfoldError::InvalidHeader(raw.to_string()));
        }
        Ok((name.to_string(), value.trim().to_string()))
    }

    /// Build from `Name: value` strings
    pub fn from_pairs<'a>(raw: impl IntoIterator<Item = &'a str>) -> ScanfoldResult<Self> {
        let mut headers = Self::new();
        for pair in raw {
            let (name, value) = Self::parse_pair(pair)?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&BTreeMap<String, String>> for CustomHeaders {
    fn from(map: &BTreeMap<String, String>) -> Self {
        Self(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

// Values are usually tokens; keep them out of debug logs.
impl fmt::Debug for CustomHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.0.iter().map(|(k, _)| format!("{}: <redacted>", k)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_is_retryable() {
        assert!(RpcError::Transport("reset".to_string()).is_retryable());
        assert!(!RpcError::Application {
            status: 400,
            message: "bad".to_string()
        }
        .is_retryable());
        assert!(!RpcError::Decode("eof".to_string()).is_retryable());
        assert!(!RpcError::Request("invalid uri".to_string()).is_retryable());
    }

    #[test]
    fn parse_header_pairs() {
        let headers =
            CustomHeaders::from_pairs(["Authorization: Bearer abc", "X-Scan-Id:42"]).unwrap();
        let pairs: Vec<_> = headers.iter().collect();
        assert_eq!(
            pairs,
            vec![("Authorization", "Bearer abc"), ("X-Scan-Id", "42")]
        );
    }

    #[test]
    fn reject_malformed_header() {
        assert!(CustomHeaders::parse_pair("no-colon").is_err());
        assert!(CustomHeaders::parse_pair(": value").is_err());
    }

    #[test]
    fn debug_redacts_values() {
        let headers = CustomHeaders::from_pairs(["Scanfold-Token: s3cret"]).unwrap();
        let debug = format!("{:?}", headers);
        assert!(debug.contains("Scanfold-Token"));
        assert!(!debug.contains("s3cret"));
    }
}
