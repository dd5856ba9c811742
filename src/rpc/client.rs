//! Remote scan driver

use crate::error::{ScanfoldError, ScanfoldResult};
use crate::rpc::http::HttpClient;
use crate::rpc::retry::{retry, DispatchContext, RetryError, RetryPolicy};
use crate::rpc::wire::{ScanRequest, ScanResponse, WireScanOptions, SCAN_PATH};
use crate::rpc::{CustomHeaders, RpcError};
use crate::types::{Os, Results, ScanOptions};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Sends one scan request and returns the decoded response
#[async_trait]
pub trait ScanTransport: Send + Sync {
    async fn scan(
        &self,
        request: &ScanRequest,
        headers: &CustomHeaders,
    ) -> Result<ScanResponse, RpcError>;
}

#[async_trait]
impl ScanTransport for HttpClient {
    async fn scan(
        &self,
        request: &ScanRequest,
        headers: &CustomHeaders,
    ) -> Result<ScanResponse, RpcError> {
        self.post_json(SCAN_PATH, request, headers).await
    }
}

/// Dispatches scans to a remote server with bounded retries
#[derive(Clone)]
pub struct RemoteScanner {
    transport: Arc<dyn ScanTransport>,
    headers: CustomHeaders,
    retry: RetryPolicy,
}

impl RemoteScanner {
    pub fn new(transport: Arc<dyn ScanTransport>, headers: CustomHeaders) -> Self {
        Self {
            transport,
            headers,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Scan `target` on the server
    ///
    /// Transport failures are retried per the configured policy. Server
    /// rejections and malformed responses fail at once. On failure the
    /// error names `target`; callers scanning several targets concurrently
    /// are unaffected.
    pub async fn scan(
        &self,
        ctx: &DispatchContext,
        target: &str,
        artifact_key: &str,
        blob_keys: &[String],
        options: &ScanOptions,
    ) -> ScanfoldResult<(Results, Option<Os>)> {
        let request = ScanRequest {
            target: target.to_string(),
            artifact_id: artifact_key.to_string(),
            blob_ids: blob_keys.to_vec(),
            options: WireScanOptions::from(options),
        };

        debug!(
            "Dispatching scan of {} ({} blob(s)) to remote server",
            target,
            blob_keys.len()
        );

        let response = retry(&self.retry, ctx, || {
            self.transport.scan(&request, &self.headers)
        })
        .await
        .map_err(|e| match e {
            RetryError::Cancelled(reason) => ScanfoldError::Cancelled {
                target: target.to_string(),
                reason,
            },
            RetryError::Failed { attempts, source } => ScanfoldError::DispatchFailed {
                target: target.to_string(),
                attempts,
                source,
            },
        })?;

        Ok((response.results, response.os))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CancelReason;
    use crate::types::{DetectedVulnerability, ScanResult, Severity};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Fails with `error` for the first `failures` calls, then succeeds
    struct FlakyTransport {
        failures: u32,
        error: RpcError,
        calls: AtomicU32,
        seen_headers: Mutex<Vec<CustomHeaders>>,
    }

    impl FlakyTransport {
        fn new(failures: u32, error: RpcError) -> Self {
            Self {
                failures,
                error,
                calls: AtomicU32::new(0),
                seen_headers: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ScanTransport for FlakyTransport {
        async fn scan(
            &self,
            request: &ScanRequest,
            headers: &CustomHeaders,
        ) -> Result<ScanResponse, RpcError> {
            self.seen_headers.lock().unwrap().push(headers.clone());
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(self.error.clone());
            }

            let result = ScanResult {
                target: request.target.clone(),
                vulnerabilities: vec![DetectedVulnerability {
                    vulnerability_id: "CVE-2024-0001".to_string(),
                    pkg_name: "openssl".to_string(),
                    severity: Severity::High,
                    ..Default::default()
                }],
                ..Default::default()
            };
            Ok(ScanResponse {
                os: None,
                results: Results::from(vec![result]),
            })
        }
    }

    /// Never answers
    struct HangingTransport;

    #[async_trait]
    impl ScanTransport for HangingTransport {
        async fn scan(&self, _: &ScanRequest, _: &CustomHeaders) -> Result<ScanResponse, RpcError> {
            std::future::pending().await
        }
    }

    fn transient() -> RpcError {
        RpcError::Transport("connection reset by peer".to_string())
    }

    fn blobs() -> Vec<String> {
        vec!["sha256:aaa".to_string(), "sha256:bbb".to_string()]
    }

    #[tokio::test]
    async fn succeeds_within_retry_budget() {
        // Fails N-1 = 3 times, succeeds on attempt N = 4
        let transport = Arc::new(FlakyTransport::new(3, transient()));
        let scanner = RemoteScanner::new(transport.clone(), CustomHeaders::new())
            .with_retry(RetryPolicy::immediate(4));

        let (results, _) = scanner
            .scan(
                &DispatchContext::new(),
                "alpine:3.19",
                "sha256:art",
                &blobs(),
                &ScanOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(transport.calls(), 4);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].target, "alpine:3.19");
    }

    #[tokio::test]
    async fn budget_one_below_needed_attempts_fails() {
        // Fails N-1 = 3 times; a budget of 3 attempts never reaches the success
        let transport = Arc::new(FlakyTransport::new(3, transient()));
        let scanner = RemoteScanner::new(transport.clone(), CustomHeaders::new())
            .with_retry(RetryPolicy::immediate(3));

        let err = scanner
            .scan(
                &DispatchContext::new(),
                "alpine:3.19",
                "sha256:art",
                &blobs(),
                &ScanOptions::default(),
            )
            .await
            .unwrap_err();

        match err {
            ScanfoldError::DispatchFailed {
                target, attempts, ..
            } => {
                assert_eq!(target, "alpine:3.19");
                assert_eq!(attempts, 3);
            }
            other => panic!("expected DispatchFailed, got {:?}", other),
        }
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn application_error_is_not_retried() {
        let rejection = RpcError::Application {
            status: 401,
            message: "invalid token".to_string(),
        };
        let transport = Arc::new(FlakyTransport::new(1, rejection.clone()));
        let scanner = RemoteScanner::new(transport.clone(), CustomHeaders::new())
            .with_retry(RetryPolicy::immediate(5));

        let err = scanner
            .scan(
                &DispatchContext::new(),
                "nginx:1.25",
                "sha256:art",
                &blobs(),
                &ScanOptions::default(),
            )
            .await
            .unwrap_err();

        assert_eq!(transport.calls(), 1);
        assert!(matches!(
            err,
            ScanfoldError::DispatchFailed { attempts: 1, ref source, .. } if *source == rejection
        ));
    }

    #[tokio::test]
    async fn decode_error_is_not_retried() {
        let transport = Arc::new(FlakyTransport::new(
            1,
            RpcError::Decode("expected value at line 1".to_string()),
        ));
        let scanner = RemoteScanner::new(transport.clone(), CustomHeaders::new())
            .with_retry(RetryPolicy::immediate(5));

        let result = scanner
            .scan(
                &DispatchContext::new(),
                "nginx:1.25",
                "sha256:art",
                &blobs(),
                &ScanOptions::default(),
            )
            .await;

        assert!(result.is_err());
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn cancellation_aborts_in_flight_request() {
        let scanner = RemoteScanner::new(Arc::new(HangingTransport), CustomHeaders::new());
        let ctx = DispatchContext::new();

        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = scanner
            .scan(&ctx, "redis:7", "sha256:art", &blobs(), &ScanOptions::default())
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(!err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_is_reported_as_cancellation() {
        let scanner = RemoteScanner::new(Arc::new(HangingTransport), CustomHeaders::new());
        let ctx = DispatchContext::new().with_timeout(Duration::from_secs(1));

        let err = scanner
            .scan(&ctx, "redis:7", "sha256:art", &blobs(), &ScanOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ScanfoldError::Cancelled {
                reason: CancelReason::DeadlineExceeded,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn headers_travel_with_every_attempt() {
        let transport = Arc::new(FlakyTransport::new(1, transient()));
        let headers = CustomHeaders::from_pairs(["Scanfold-Token: s3cret"]).unwrap();
        let scanner = RemoteScanner::new(transport.clone(), headers.clone())
            .with_retry(RetryPolicy::immediate(3));

        scanner
            .scan(
                &DispatchContext::new(),
                "alpine:3.19",
                "sha256:art",
                &blobs(),
                &ScanOptions::default(),
            )
            .await
            .unwrap();

        let seen = transport.seen_headers.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|h| *h == headers));
    }
}
