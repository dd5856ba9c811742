//! On-disk cache that persists across scanner invocations
//!
//! Layout: `<dir>/fanal/artifact/<key>.json` and `<dir>/fanal/blob/<key>.json`,
//! with `:` in keys stored as `_`. Writes land in a temp file first and are
//! renamed into place, so concurrent writers of one key never expose a torn
//! entry (last writer wins; content is identical per key anyway).

use crate::cache::{ArtifactCache, LocalArtifactCache, MissingBlobs};
use crate::error::{ScanfoldError, ScanfoldResult};
use crate::types::{ArtifactInfo, BlobInfo, ARTIFACT_JSON_SCHEMA_VERSION, BLOB_JSON_SCHEMA_VERSION};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tracing::{debug, info};

const BACKEND: &str = "fs";

/// Format bytes as human-readable size (e.g., "1.5 GB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Which table an entry lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheEntryKind {
    Artifact,
    Blob,
}

impl CacheEntryKind {
    fn dir_name(&self) -> &'static str {
        match self {
            Self::Artifact => "artifact",
            Self::Blob => "blob",
        }
    }
}

impl fmt::Display for CacheEntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// One stored entry, as shown by `scanfold cache list`
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntrySummary {
    pub key: String,
    pub kind: CacheEntryKind,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct SchemaProbe {
    #[serde(rename = "SchemaVersion", default)]
    schema_version: u32,
}

/// JSON-file cache rooted at a directory
#[derive(Debug)]
pub struct FsCache {
    root: PathBuf,
    tmp_seq: AtomicU64,
}

impl FsCache {
    /// Open (creating if needed) a cache under `cache_dir`
    pub async fn new(cache_dir: impl AsRef<Path>) -> ScanfoldResult<Self> {
        let root = cache_dir.as_ref().join("fanal");
        for kind in [CacheEntryKind::Artifact, CacheEntryKind::Blob] {
            let dir = root.join(kind.dir_name());
            fs::create_dir_all(&dir).await.map_err(|e| {
                ScanfoldError::cache_unavailable(
                    BACKEND,
                    format!("creating {}: {}", dir.display(), e),
                )
            })?;
        }

        debug!("Opened filesystem cache at {}", root.display());
        Ok(Self {
            root,
            tmp_seq: AtomicU64::new(0),
        })
    }

    /// Root directory of the cache tables
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, kind: CacheEntryKind, key: &str) -> ScanfoldResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '-' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(ScanfoldError::InvalidCacheKey(key.to_string()));
        }

        Ok(self
            .root
            .join(kind.dir_name())
            .join(format!("{}.json", key.replace(':', "_"))))
    }

    async fn write_entry<T: Serialize>(
        &self,
        kind: CacheEntryKind,
        key: &str,
        value: &T,
    ) -> ScanfoldResult<()> {
        let path = self.entry_path(kind, key)?;
        let content = serde_json::to_vec(value)?;

        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("json.tmp-{}-{}", std::process::id(), seq));

        fs::write(&tmp, &content).await.map_err(|e| {
            ScanfoldError::cache_unavailable(BACKEND, format!("writing {}: {}", tmp.display(), e))
        })?;
        fs::rename(&tmp, &path).await.map_err(|e| {
            ScanfoldError::cache_unavailable(BACKEND, format!("renaming {}: {}", tmp.display(), e))
        })?;

        debug!("Cached {} {}", kind, key);
        Ok(())
    }

    async fn read_raw(&self, kind: CacheEntryKind, key: &str) -> ScanfoldResult<Option<Vec<u8>>> {
        let path = self.entry_path(kind, key)?;
        match fs::read(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ScanfoldError::cache_unavailable(
                BACKEND,
                format!("reading {}: {}", path.display(), e),
            )),
        }
    }

    async fn read_entry<T: DeserializeOwned>(
        &self,
        kind: CacheEntryKind,
        key: &str,
    ) -> ScanfoldResult<Option<T>> {
        let Some(content) = self.read_raw(kind, key).await? else {
            return Ok(None);
        };

        serde_json::from_slice(&content)
            .map(Some)
            .map_err(|e| ScanfoldError::CacheCorrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    /// Whether an entry exists and was written with the current schema
    async fn is_current(
        &self,
        kind: CacheEntryKind,
        key: &str,
        schema_version: u32,
    ) -> ScanfoldResult<bool> {
        let Some(content) = self.read_raw(kind, key).await? else {
            return Ok(false);
        };

        match serde_json::from_slice::<SchemaProbe>(&content) {
            Ok(probe) if probe.schema_version == schema_version => Ok(true),
            Ok(probe) => {
                debug!(
                    "Cached {} {} has schema {} (want {}), treating as missing",
                    kind, key, probe.schema_version, schema_version
                );
                Ok(false)
            }
            Err(e) => {
                debug!("Unreadable cached {} {}: {}", kind, key, e);
                Ok(false)
            }
        }
    }

    /// List every stored entry
    pub async fn list(&self) -> ScanfoldResult<Vec<CacheEntrySummary>> {
        let mut summaries = Vec::new();

        for kind in [CacheEntryKind::Artifact, CacheEntryKind::Blob] {
            let dir = self.root.join(kind.dir_name());
            let mut entries = fs::read_dir(&dir)
                .await
                .map_err(|e| ScanfoldError::io(format!("reading {}", dir.display()), e))?;

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| ScanfoldError::io("reading cache entry", e))?
            {
                let path = entry.path();
                if path.extension().is_none_or(|ext| ext != "json") {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };

                let metadata = entry
                    .metadata()
                    .await
                    .map_err(|e| ScanfoldError::io("reading cache entry metadata", e))?;

                summaries.push(CacheEntrySummary {
                    key: stem.replace('_', ":"),
                    kind,
                    size_bytes: metadata.len(),
                    modified: metadata.modified().ok().map(DateTime::<Utc>::from),
                });
            }
        }

        summaries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(summaries)
    }
}

#[async_trait]
impl ArtifactCache for FsCache {
    async fn put_artifact(&self, artifact_id: &str, info: &ArtifactInfo) -> ScanfoldResult<()> {
        self.write_entry(CacheEntryKind::Artifact, artifact_id, info)
            .await
    }

    async fn put_blob(&self, blob_id: &str, info: &BlobInfo) -> ScanfoldResult<()> {
        self.write_entry(CacheEntryKind::Blob, blob_id, info).await
    }

    async fn missing_blobs(
        &self,
        artifact_id: &str,
        blob_ids: &[String],
    ) -> ScanfoldResult<MissingBlobs> {
        let missing_artifact = !self
            .is_current(
                CacheEntryKind::Artifact,
                artifact_id,
                ARTIFACT_JSON_SCHEMA_VERSION,
            )
            .await?;

        let mut missing_blob_ids = Vec::new();
        for id in blob_ids {
            if !self
                .is_current(CacheEntryKind::Blob, id, BLOB_JSON_SCHEMA_VERSION)
                .await?
            {
                missing_blob_ids.push(id.clone());
            }
        }

        Ok(MissingBlobs {
            missing_artifact,
            missing_blob_ids,
        })
    }

    async fn delete_blobs(&self, blob_ids: &[String]) -> ScanfoldResult<()> {
        for id in blob_ids {
            let path = self.entry_path(CacheEntryKind::Blob, id)?;
            match fs::remove_file(&path).await {
                Ok(()) => debug!("Removed cached blob {}", id),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(ScanfoldError::io(
                        format!("removing {}", path.display()),
                        e,
                    ))
                }
            }
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}

#[async_trait]
impl LocalArtifactCache for FsCache {
    async fn get_artifact(&self, artifact_id: &str) -> ScanfoldResult<Option<ArtifactInfo>> {
        self.read_entry(CacheEntryKind::Artifact, artifact_id).await
    }

    async fn get_blob(&self, blob_id: &str) -> ScanfoldResult<Option<BlobInfo>> {
        self.read_entry(CacheEntryKind::Blob, blob_id).await
    }

    async fn clear(&self) -> ScanfoldResult<()> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root)
                .await
                .map_err(|e| ScanfoldError::io(format!("removing {}", self.root.display()), e))?;
        }
        for kind in [CacheEntryKind::Artifact, CacheEntryKind::Blob] {
            let dir = self.root.join(kind.dir_name());
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| ScanfoldError::io(format!("creating {}", dir.display()), e))?;
        }

        info!("Cleared cache at {}", self.root.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Application, Package};
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn test_cache() -> (FsCache, TempDir) {
        let temp = TempDir::new().unwrap();
        let cache = FsCache::new(temp.path()).await.unwrap();
        (cache, temp)
    }

    fn npm_blob() -> BlobInfo {
        BlobInfo {
            applications: vec![Application {
                r#type: "npm".to_string(),
                file_path: "app/package-lock.json".to_string(),
                libraries: vec![Package {
                    id: "lodash@4.17.20".to_string(),
                    name: "lodash".to_string(),
                    version: "4.17.20".to_string(),
                    ..Default::default()
                }],
            }],
            ..BlobInfo::new("sha256:1111")
        }
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[tokio::test]
    async fn put_then_get() {
        let (cache, _temp) = test_cache().await;
        let info = npm_blob();

        cache.put_blob("sha256:aaaa", &info).await.unwrap();
        let stored = cache.get_blob("sha256:aaaa").await.unwrap().unwrap();

        assert_eq!(stored, info);
        assert!(cache
            .root()
            .join("blob")
            .join("sha256_aaaa.json")
            .exists());
    }

    #[tokio::test]
    async fn repeated_put_is_idempotent() {
        let (cache, _temp) = test_cache().await;
        let info = npm_blob();

        for _ in 0..5 {
            cache.put_blob("sha256:aaaa", &info).await.unwrap();
        }

        let missing = cache
            .missing_blobs("sha256:art", &["sha256:aaaa".to_string()])
            .await
            .unwrap();
        assert!(missing.missing_blob_ids.is_empty());
        assert_eq!(cache.get_blob("sha256:aaaa").await.unwrap(), Some(info));
    }

    #[tokio::test]
    async fn concurrent_same_key_writes_leave_valid_entry() {
        let temp = TempDir::new().unwrap();
        let cache = Arc::new(FsCache::new(temp.path()).await.unwrap());
        let info = npm_blob();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let info = info.clone();
            handles.push(tokio::spawn(async move {
                cache.put_blob("sha256:shared", &info).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cache.get_blob("sha256:shared").await.unwrap(), Some(info));
    }

    #[tokio::test]
    async fn stale_schema_reported_missing() {
        let (cache, _temp) = test_cache().await;
        let stale = BlobInfo {
            schema_version: BLOB_JSON_SCHEMA_VERSION - 1,
            ..npm_blob()
        };
        cache.put_blob("sha256:old", &stale).await.unwrap();

        let missing = cache
            .missing_blobs("sha256:art", &["sha256:old".to_string()])
            .await
            .unwrap();
        assert_eq!(missing.missing_blob_ids, vec!["sha256:old".to_string()]);
    }

    #[tokio::test]
    async fn corrupt_entry_is_missing_but_get_fails() {
        let (cache, _temp) = test_cache().await;
        std::fs::write(cache.root().join("blob").join("sha256_bad.json"), b"{not json").unwrap();

        let missing = cache
            .missing_blobs("sha256:art", &["sha256:bad".to_string()])
            .await
            .unwrap();
        assert_eq!(missing.missing_blob_ids.len(), 1);

        let err = cache.get_blob("sha256:bad").await.unwrap_err();
        assert!(matches!(err, ScanfoldError::CacheCorrupt { .. }));
    }

    #[tokio::test]
    async fn rejects_path_like_keys() {
        let (cache, _temp) = test_cache().await;
        let err = cache
            .put_blob("../../etc/passwd", &npm_blob())
            .await
            .unwrap_err();
        assert!(matches!(err, ScanfoldError::InvalidCacheKey(_)));
    }

    #[tokio::test]
    async fn persists_across_instances() {
        let temp = TempDir::new().unwrap();
        {
            let cache = FsCache::new(temp.path()).await.unwrap();
            cache.put_blob("sha256:keep", &npm_blob()).await.unwrap();
        }

        let reopened = FsCache::new(temp.path()).await.unwrap();
        let missing = reopened
            .missing_blobs("sha256:art", &["sha256:keep".to_string()])
            .await
            .unwrap();
        assert!(missing.missing_blob_ids.is_empty());
    }

    #[tokio::test]
    async fn list_delete_clear() {
        let (cache, _temp) = test_cache().await;
        cache.put_blob("sha256:one", &npm_blob()).await.unwrap();
        cache.put_blob("sha256:two", &npm_blob()).await.unwrap();
        cache
            .put_artifact(
                "sha256:img",
                &ArtifactInfo {
                    schema_version: ARTIFACT_JSON_SCHEMA_VERSION,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let listed = cache.list().await.unwrap();
        assert_eq!(listed.len(), 3);
        assert!(listed
            .iter()
            .any(|e| e.key == "sha256:img" && e.kind == CacheEntryKind::Artifact));

        cache.delete_blobs(&["sha256:one".to_string()]).await.unwrap();
        assert!(cache.get_blob("sha256:one").await.unwrap().is_none());

        cache.clear().await.unwrap();
        assert!(cache.list().await.unwrap().is_empty());
    }
}
