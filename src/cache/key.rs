//! Content-addressed cache key derivation
//!
//! A key is the SHA256 of the blob's content digest combined with the
//! analyzer versions and disabled analyzer groups in effect. Same content +
//! same analyzers = same key; upgrading an analyzer invalidates old entries
//! without touching them.

use crate::error::{ScanfoldError, ScanfoldResult};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Analyzer families that a scan mode can switch off
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AnalyzerGroup {
    /// Installed-package databases (dpkg, apk, rpm, jar/wheel metadata)
    IndividualPackages,
    /// Lockfiles and manifests (package-lock.json, Cargo.lock, ...)
    Lockfiles,
    /// Config files evaluated by the policy engine
    Config,
    /// Secret detection
    Secret,
}

impl AnalyzerGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IndividualPackages => "individual-pkgs",
            Self::Lockfiles => "lockfiles",
            Self::Config => "config",
            Self::Secret => "secret",
        }
    }
}

impl fmt::Display for AnalyzerGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hash raw bytes into a `sha256:<hex>` digest
pub fn digest_bytes(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("sha256:{}", hex::encode(hash))
}

/// Hash a file's contents into a `sha256:<hex>` digest
pub fn digest_file(path: &Path) -> ScanfoldResult<String> {
    let contents = std::fs::read(path)
        .map_err(|e| ScanfoldError::io(format!("reading {}", path.display()), e))?;
    Ok(digest_bytes(&contents))
}

#[derive(Serialize)]
struct KeyInput<'a> {
    id: &'a str,
    analyzer_versions: &'a BTreeMap<String, u32>,
    disabled_analyzers: Vec<&'static str>,
}

/// Derive the cache key for a blob or artifact
///
/// `id` is the content digest (layer diff ID, image config digest, or the
/// digest of a filesystem snapshot).
pub fn calc_key(
    id: &str,
    analyzer_versions: &BTreeMap<String, u32>,
    disabled: &[AnalyzerGroup],
) -> ScanfoldResult<String> {
    let mut disabled_analyzers: Vec<&'static str> =
        disabled.iter().map(AnalyzerGroup::as_str).collect();
    disabled_analyzers.sort_unstable();
    disabled_analyzers.dedup();

    let input = KeyInput {
        id,
        analyzer_versions,
        disabled_analyzers,
    };

    let encoded = serde_json::to_vec(&input)?;
    Ok(digest_bytes(&encoded))
}
