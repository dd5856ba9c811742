//! Degrade an unreachable cache to "nothing is cached"

use crate::cache::{ArtifactCache, LocalArtifactCache, MissingBlobs};
use crate::error::ScanfoldResult;
use crate::types::{ArtifactInfo, BlobInfo};
use async_trait::async_trait;
use tracing::warn;

/// Wraps a backend so that availability failures never abort a scan
///
/// - `missing_blobs` on an unavailable backend reports every candidate
///   (and the artifact) as missing.
/// - Failed writes and deletes are logged and reported as success.
///
/// Any other error, such as a corrupt entry, is passed through.
#[derive(Debug)]
pub struct FailOpen<C> {
    inner: C,
}

impl<C> FailOpen<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: ArtifactCache> FailOpen<C> {
    fn absorb(&self, op: &str, result: ScanfoldResult<()>) -> ScanfoldResult<()> {
        match result {
            Err(e) if e.is_cache_unavailable() => {
                warn!(
                    "Cache {} failed on {} backend, continuing without it: {}",
                    op,
                    self.inner.backend_name(),
                    e
                );
                Ok(())
            }
            other => other,
        }
    }
}

#[async_trait]
impl<C: ArtifactCache> ArtifactCache for FailOpen<C> {
    async fn put_artifact(&self, artifact_id: &str, info: &ArtifactInfo) -> ScanfoldResult<()> {
        let result = self.inner.put_artifact(artifact_id, info).await;
        self.absorb("write", result)
    }

    async fn put_blob(&self, blob_id: &str, info: &BlobInfo) -> ScanfoldResult<()> {
        let result = self.inner.put_blob(blob_id, info).await;
        self.absorb("write", result)
    }

    async fn missing_blobs(
        &self,
        artifact_id: &str,
        blob_ids: &[String],
    ) -> ScanfoldResult<MissingBlobs> {
        match self.inner.missing_blobs(artifact_id, blob_ids).await {
            Err(e) if e.is_cache_unavailable() => {
                warn!(
                    "Cache lookup failed on {} backend, analyzing all {} blob(s): {}",
                    self.inner.backend_name(),
                    blob_ids.len(),
                    e
                );
                Ok(MissingBlobs::all(blob_ids))
            }
            other => other,
        }
    }

    async fn delete_blobs(&self, blob_ids: &[String]) -> ScanfoldResult<()> {
        let result = self.inner.delete_blobs(blob_ids).await;
        self.absorb("delete", result)
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}

#[async_trait]
impl<C: LocalArtifactCache> LocalArtifactCache for FailOpen<C> {
    async fn get_artifact(&self, artifact_id: &str) -> ScanfoldResult<Option<ArtifactInfo>> {
        self.inner.get_artifact(artifact_id).await
    }

    async fn get_blob(&self, blob_id: &str) -> ScanfoldResult<Option<BlobInfo>> {
        self.inner.get_blob(blob_id).await
    }

    async fn clear(&self) -> ScanfoldResult<()> {
        self.inner.clear().await
    }
}
