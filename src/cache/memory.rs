//! In-process cache for single-run, serverless scanning

use crate::cache::{ArtifactCache, LocalArtifactCache, MissingBlobs};
use crate::error::ScanfoldResult;
use crate::types::{ArtifactInfo, BlobInfo};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Cache held in memory for the lifetime of one process
#[derive(Debug, Default)]
pub struct MemoryCache {
    artifacts: RwLock<HashMap<String, ArtifactInfo>>,
    blobs: RwLock<HashMap<String, BlobInfo>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached blobs
    pub async fn blob_count(&self) -> usize {
        self.blobs.read().await.len()
    }
}

#[async_trait]
impl ArtifactCache for MemoryCache {
    async fn put_artifact(&self, artifact_id: &str, info: &ArtifactInfo) -> ScanfoldResult<()> {
        self.artifacts
            .write()
            .await
            .insert(artifact_id.to_string(), info.clone());
        Ok(())
    }

    async fn put_blob(&self, blob_id: &str, info: &BlobInfo) -> ScanfoldResult<()> {
        self.blobs
            .write()
            .await
            .insert(blob_id.to_string(), info.clone());
        debug!("Cached blob {} in memory", blob_id);
        Ok(())
    }

    async fn missing_blobs(
        &self,
        artifact_id: &str,
        blob_ids: &[String],
    ) -> ScanfoldResult<MissingBlobs> {
        let missing_artifact = !self.artifacts.read().await.contains_key(artifact_id);

        let blobs = self.blobs.read().await;
        let missing_blob_ids = blob_ids
            .iter()
            .filter(|id| !blobs.contains_key(id.as_str()))
            .cloned()
            .collect();

        Ok(MissingBlobs {
            missing_artifact,
            missing_blob_ids,
        })
    }

    async fn delete_blobs(&self, blob_ids: &[String]) -> ScanfoldResult<()> {
        let mut blobs = self.blobs.write().await;
        for id in blob_ids {
            blobs.remove(id);
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl LocalArtifactCache for MemoryCache {
    async fn get_artifact(&self, artifact_id: &str) -> ScanfoldResult<Option<ArtifactInfo>> {
        Ok(self.artifacts.read().await.get(artifact_id).cloned())
    }

    async fn get_blob(&self, blob_id: &str) -> ScanfoldResult<Option<BlobInfo>> {
        Ok(self.blobs.read().await.get(blob_id).cloned())
    }

    async fn clear(&self) -> ScanfoldResult<()> {
        self.artifacts.write().await.clear();
        self.blobs.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Os, BLOB_JSON_SCHEMA_VERSION};
    use std::sync::Arc;

    fn blob(diff_id: &str) -> BlobInfo {
        BlobInfo {
            os: Some(Os {
                family: "alpine".to_string(),
                name: "3.19.1".to_string(),
                eosl: false,
            }),
            ..BlobInfo::new(diff_id)
        }
    }

    #[tokio::test]
    async fn repeated_put_is_idempotent() {
        let cache = MemoryCache::new();
        let info = blob("sha256:layer1");

        for _ in 0..3 {
            cache.put_blob("key-1", &info).await.unwrap();
        }

        let missing = cache
            .missing_blobs("artifact", &["key-1".to_string()])
            .await
            .unwrap();
        assert!(missing.missing_blob_ids.is_empty());
        assert_eq!(cache.get_blob("key-1").await.unwrap(), Some(info));
        assert_eq!(cache.blob_count().await, 1);
    }

    #[tokio::test]
    async fn missing_preserves_candidate_order() {
        let cache = MemoryCache::new();
        cache.put_blob("b", &blob("sha256:b")).await.unwrap();

        let candidates = vec!["c".to_string(), "b".to_string(), "a".to_string()];
        let missing = cache.missing_blobs("artifact", &candidates).await.unwrap();

        assert!(missing.missing_artifact);
        assert_eq!(missing.missing_blob_ids, vec!["c".to_string(), "a".to_string()]);
    }

    #[tokio::test]
    async fn artifact_presence_reported() {
        let cache = MemoryCache::new();
        let info = ArtifactInfo {
            schema_version: crate::types::ARTIFACT_JSON_SCHEMA_VERSION,
            architecture: "amd64".to_string(),
            ..Default::default()
        };
        cache.put_artifact("img", &info).await.unwrap();

        let missing = cache.missing_blobs("img", &[]).await.unwrap();
        assert!(!missing.missing_artifact);
        assert_eq!(cache.get_artifact("img").await.unwrap(), Some(info));
    }

    #[tokio::test]
    async fn concurrent_disjoint_writes() {
        let cache = Arc::new(MemoryCache::new());
        let mut handles = Vec::new();

        for i in 0..16 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                let key = format!("key-{}", i);
                cache.put_blob(&key, &blob(&key)).await.unwrap();
                cache.missing_blobs("artifact", &[key]).await.unwrap()
            }));
        }

        for handle in handles {
            let missing = handle.await.unwrap();
            assert!(missing.missing_blob_ids.is_empty());
        }
        assert_eq!(cache.blob_count().await, 16);
        assert_eq!(
            cache.get_blob("key-3").await.unwrap().unwrap().schema_version,
            BLOB_JSON_SCHEMA_VERSION
        );
    }

    #[tokio::test]
    async fn delete_and_clear() {
        let cache = MemoryCache::new();
        cache.put_blob("a", &blob("sha256:a")).await.unwrap();
        cache.put_blob("b", &blob("sha256:b")).await.unwrap();

        cache.delete_blobs(&["a".to_string()]).await.unwrap();
        assert!(cache.get_blob("a").await.unwrap().is_none());
        assert!(cache.get_blob("b").await.unwrap().is_some());

        cache.clear().await.unwrap();
        assert_eq!(cache.blob_count().await, 0);
    }
}
