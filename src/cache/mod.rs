//! Content-addressed cache of per-blob analysis results
//!
//! Lets a scanner skip blobs (image layers, filesystem snapshots) that were
//! already analyzed. Keys are derived from content, so a base layer shared
//! by many images is analyzed once.
//!
//! # Backends
//!
//! | Backend | Scope | Notes |
//! |---------|-------|-------|
//! | [`MemoryCache`] | one process | no persistence |
//! | [`FsCache`] | one host | JSON file per key, atomic rename on write |
//! | [`RemoteCache`] | shared | HTTP cache service |
//!
//! Caching is an optimization. Wrap any backend in [`FailOpen`] so an
//! unreachable backend degrades to "everything missing" instead of
//! aborting the scan.

pub mod fail_open;
pub mod fs;
pub mod key;
pub mod memory;
pub mod remote;

pub use fail_open::FailOpen;
pub use fs::{CacheEntryKind, CacheEntrySummary, FsCache};
pub use key::{calc_key, digest_bytes, AnalyzerGroup};
pub use memory::MemoryCache;
pub use remote::RemoteCache;

use crate::error::ScanfoldResult;
use crate::types::{ArtifactInfo, BlobInfo};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Which of the candidate keys still need analysis
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingBlobs {
    /// The artifact record itself is absent
    pub missing_artifact: bool,
    /// Candidate blob keys not present, in candidate order
    pub missing_blob_ids: Vec<String>,
}

impl MissingBlobs {
    /// Everything is missing; used when the backend cannot answer
    pub fn all(blob_ids: &[String]) -> Self {
        Self {
            missing_artifact: true,
            missing_blob_ids: blob_ids.to_vec(),
        }
    }
}

/// Write side of the cache, used while inspecting an artifact
#[async_trait]
pub trait ArtifactCache: Send + Sync {
    /// Record metadata for a top-level artifact (idempotent)
    async fn put_artifact(&self, artifact_id: &str, info: &ArtifactInfo) -> ScanfoldResult<()>;

    /// Record the analysis output for one blob (idempotent)
    async fn put_blob(&self, blob_id: &str, info: &BlobInfo) -> ScanfoldResult<()>;

    /// Return exactly the candidate keys that are not cached
    async fn missing_blobs(
        &self,
        artifact_id: &str,
        blob_ids: &[String],
    ) -> ScanfoldResult<MissingBlobs>;

    /// Invalidate the given blob entries
    async fn delete_blobs(&self, blob_ids: &[String]) -> ScanfoldResult<()>;

    /// Backend name for log messages
    fn backend_name(&self) -> &'static str;
}

/// Read side of the cache, used by the local scan driver
#[async_trait]
pub trait LocalArtifactCache: Send + Sync {
    async fn get_artifact(&self, artifact_id: &str) -> ScanfoldResult<Option<ArtifactInfo>>;

    async fn get_blob(&self, blob_id: &str) -> ScanfoldResult<Option<BlobInfo>>;

    /// Remove every entry
    async fn clear(&self) -> ScanfoldResult<()>;
}
