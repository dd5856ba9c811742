//! Shared cache served by a remote cache service
//!
//! Uses the same transport settings (TLS, headers, retries) as the remote
//! scan driver. Every failure is reported as `CacheUnavailable` so that a
//! [`FailOpen`](crate::cache::FailOpen) wrapper can degrade gracefully.

use crate::cache::{ArtifactCache, MissingBlobs};
use crate::error::{ScanfoldError, ScanfoldResult};
use crate::rpc::http::HttpClient;
use crate::rpc::retry::{retry, DispatchContext, RetryError, RetryPolicy};
use crate::rpc::wire::{
    DeleteBlobsRequest, Empty, MissingBlobsRequest, MissingBlobsResponse, PutArtifactRequest,
    PutBlobRequest, CACHE_DELETE_BLOBS_PATH, CACHE_MISSING_BLOBS_PATH, CACHE_PUT_ARTIFACT_PATH,
    CACHE_PUT_BLOB_PATH,
};
use crate::rpc::CustomHeaders;
use crate::types::{ArtifactInfo, BlobInfo};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

const BACKEND: &str = "remote";

#[derive(Debug, Clone)]
pub struct RemoteCache {
    client: HttpClient,
    headers: CustomHeaders,
    retry: RetryPolicy,
    ctx: DispatchContext,
}

impl RemoteCache {
    pub fn new(client: HttpClient, headers: CustomHeaders) -> Self {
        Self {
            client,
            headers,
            retry: RetryPolicy::default(),
            ctx: DispatchContext::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Abort outstanding cache calls when `ctx` is cancelled
    pub fn with_context(mut self, ctx: DispatchContext) -> Self {
        self.ctx = ctx;
        self
    }

    async fn call<Req, Resp>(&self, path: &str, body: &Req) -> ScanfoldResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned + Send + 'static,
    {
        retry(&self.retry, &self.ctx, || {
            self.client.post_json(path, body, &self.headers)
        })
        .await
        .map_err(|e| match e {
            RetryError::Cancelled(reason) => ScanfoldError::cache_unavailable(BACKEND, reason),
            RetryError::Failed { source, .. } => ScanfoldError::cache_unavailable(
                BACKEND,
                format!("{}{}: {}", self.client.base_url(), path, source),
            ),
        })
    }
}

#[async_trait]
impl ArtifactCache for RemoteCache {
    async fn put_artifact(&self, artifact_id: &str, info: &ArtifactInfo) -> ScanfoldResult<()> {
        let request = PutArtifactRequest {
            artifact_id: artifact_id.to_string(),
            artifact_info: info.clone(),
        };
        let _: Empty = self.call(CACHE_PUT_ARTIFACT_PATH, &request).await?;
        debug!("Stored artifact {} in remote cache", artifact_id);
        Ok(())
    }

    async fn put_blob(&self, blob_id: &str, info: &BlobInfo) -> ScanfoldResult<()> {
        let request = PutBlobRequest {
            diff_id: blob_id.to_string(),
            blob_info: info.clone(),
        };
        let _: Empty = self.call(CACHE_PUT_BLOB_PATH, &request).await?;
        debug!("Stored blob {} in remote cache", blob_id);
        Ok(())
    }

    async fn missing_blobs(
        &self,
        artifact_id: &str,
        blob_ids: &[String],
    ) -> ScanfoldResult<MissingBlobs> {
        let request = MissingBlobsRequest {
            artifact_id: artifact_id.to_string(),
            blob_ids: blob_ids.to_vec(),
        };
        let response: MissingBlobsResponse = self.call(CACHE_MISSING_BLOBS_PATH, &request).await?;

        // Never trust the server to answer with keys we did not ask about
        let missing_blob_ids = blob_ids
            .iter()
            .filter(|id| response.missing_blob_ids.contains(id))
            .cloned()
            .collect();

        Ok(MissingBlobs {
            missing_artifact: response.missing_artifact,
            missing_blob_ids,
        })
    }

    async fn delete_blobs(&self, blob_ids: &[String]) -> ScanfoldResult<()> {
        let request = DeleteBlobsRequest {
            blob_ids: blob_ids.to_vec(),
        };
        let _: Empty = self.call(CACHE_DELETE_BLOBS_PATH, &request).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}
