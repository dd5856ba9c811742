//! Artifact inspection: analyze only what the cache does not already hold

use crate::cache::{calc_key, digest_bytes, AnalyzerGroup, ArtifactCache, MissingBlobs};
use crate::error::{ScanfoldError, ScanfoldResult};
use crate::types::{
    ArtifactInfo, ArtifactReference, ArtifactType, BlobInfo, ARTIFACT_JSON_SCHEMA_VERSION,
    BLOB_JSON_SCHEMA_VERSION,
};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Default number of blobs analyzed at once
pub const DEFAULT_PARALLELISM: usize = 4;

/// One content-addressed unit of scan input, e.g. an image layer
#[async_trait]
pub trait BlobSource: Send + Sync {
    /// Content digest of the blob, stable for identical content
    fn diff_id(&self) -> &str;

    /// Run the analyzers over the blob, skipping the disabled groups
    async fn analyze(&self, disabled: &[AnalyzerGroup]) -> ScanfoldResult<BlobInfo>;
}

/// A top-level scan subject made of ordered blobs
#[derive(Clone)]
pub struct ArtifactSource {
    pub name: String,
    pub r#type: ArtifactType,
    /// Content identity of the artifact itself (image config digest, ...)
    pub id: String,
    pub info: ArtifactInfo,
    /// Blobs in layer order
    pub blobs: Vec<Arc<dyn BlobSource>>,
}

impl ArtifactSource {
    /// Artifact whose identity is derived from its blobs
    pub fn from_blobs(
        name: impl Into<String>,
        r#type: ArtifactType,
        blobs: Vec<Arc<dyn BlobSource>>,
    ) -> Self {
        let joined = blobs
            .iter()
            .map(|b| b.diff_id())
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            name: name.into(),
            r#type,
            id: digest_bytes(joined.as_bytes()),
            info: ArtifactInfo {
                schema_version: ARTIFACT_JSON_SCHEMA_VERSION,
                ..Default::default()
            },
            blobs,
        }
    }
}

/// Settings that feed into cache keys
#[derive(Debug, Clone, Default)]
pub struct InspectOptions {
    pub disabled: Vec<AnalyzerGroup>,
    pub analyzer_versions: BTreeMap<String, u32>,
    pub parallelism: usize,
}

/// Turns an [`ArtifactSource`] into an [`ArtifactReference`] whose blobs
/// are all present in the cache
pub struct Inspector {
    cache: Arc<dyn ArtifactCache>,
    options: InspectOptions,
}

impl Inspector {
    pub fn new(cache: Arc<dyn ArtifactCache>, options: InspectOptions) -> Self {
        Self { cache, options }
    }

    pub fn options(&self) -> &InspectOptions {
        &self.options
    }

    fn key(&self, id: &str) -> ScanfoldResult<String> {
        calc_key(id, &self.options.analyzer_versions, &self.options.disabled)
    }

    /// Cache keys of the artifact and of each blob, in layer order
    pub fn keys(&self, source: &ArtifactSource) -> ScanfoldResult<(String, Vec<String>)> {
        let blob_keys = source
            .blobs
            .iter()
            .map(|blob| self.key(blob.diff_id()))
            .collect::<ScanfoldResult<Vec<_>>>()?;

        let artifact_input = serde_json::to_vec(&(&source.id, &blob_keys))?;
        let artifact_key = self.key(&digest_bytes(&artifact_input))?;
        Ok((artifact_key, blob_keys))
    }

    /// Which keys of `source` the cache does not hold yet
    pub async fn missing(&self, source: &ArtifactSource) -> ScanfoldResult<MissingBlobs> {
        let (artifact_key, blob_keys) = self.keys(source)?;
        self.cache.missing_blobs(&artifact_key, &blob_keys).await
    }

    pub async fn inspect(&self, source: &ArtifactSource) -> ScanfoldResult<ArtifactReference> {
        let (artifact_key, blob_keys) = self.keys(source)?;

        let missing = self.cache.missing_blobs(&artifact_key, &blob_keys).await?;
        info!(
            "{}: {} of {} blob(s) need analysis",
            source.name,
            missing.missing_blob_ids.len(),
            blob_keys.len()
        );

        let pending: Vec<(String, Arc<dyn BlobSource>)> = blob_keys
            .iter()
            .zip(&source.blobs)
            .filter(|(key, _)| missing.missing_blob_ids.contains(key))
            .map(|(key, blob)| (key.clone(), Arc::clone(blob)))
            .collect();

        let parallelism = self.options.parallelism.max(1);
        stream::iter(pending.into_iter().map(|(key, blob)| self.analyze_blob(key, blob)))
            .buffer_unordered(parallelism)
            .try_collect::<Vec<()>>()
            .await?;

        if missing.missing_artifact {
            let mut info = source.info.clone();
            info.schema_version = ARTIFACT_JSON_SCHEMA_VERSION;
            self.cache.put_artifact(&artifact_key, &info).await?;
        }

        Ok(ArtifactReference {
            name: source.name.clone(),
            r#type: source.r#type,
            id: artifact_key,
            blob_ids: blob_keys,
        })
    }

    async fn analyze_blob(&self, key: String, blob: Arc<dyn BlobSource>) -> ScanfoldResult<()> {
        debug!("Analyzing blob {}", blob.diff_id());
        let mut info = blob
            .analyze(&self.options.disabled)
            .await
            .map_err(|e| match e {
                e @ ScanfoldError::Analysis { .. } => e,
                other => ScanfoldError::Analysis {
                    key: blob.diff_id().to_string(),
                    reason: other.to_string(),
                },
            })?;

        info.schema_version = BLOB_JSON_SCHEMA_VERSION;
        if info.diff_id.is_empty() {
            info.diff_id = blob.diff_id().to_string();
        }

        self.cache.put_blob(&key, &info).await
    }
}
