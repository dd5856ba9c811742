//! Bounded exponential backoff and caller cancellation

use crate::error::CancelReason;
use crate::rpc::RpcError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Backoff schedule for transient transport failures
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first; 0 is treated as 1
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_interval: Duration::from_millis(500),
            multiplier: 1.5,
            max_interval: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Policy with `max_attempts` and no delay between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_interval: Duration::ZERO,
            multiplier: 1.0,
            max_interval: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (0-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry.min(i32::MAX as u32) as i32);
        let secs = self.initial_interval.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.max_interval.as_secs_f64() {
            return self.max_interval;
        }
        Duration::from_secs_f64(secs)
    }
}

/// Cancellation signal and optional deadline for one dispatch
#[derive(Debug, Clone, Default)]
pub struct DispatchContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl DispatchContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share an existing token, e.g. one cancelled on Ctrl-C
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Abort once `timeout` has elapsed from now
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Reason the context is already done, if it is
    pub fn check(&self) -> Option<CancelReason> {
        if self.token.is_cancelled() {
            return Some(CancelReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolve when the context is cancelled or its deadline passes
    pub async fn done(&self) -> CancelReason {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => CancelReason::Cancelled,
                _ = tokio::time::sleep_until(deadline) => CancelReason::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                CancelReason::Cancelled
            }
        }
    }
}

/// Why a retried operation gave up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    Cancelled(CancelReason),
    /// The last error and how many attempts were made
    Failed { attempts: u32, source: RpcError },
}

/// Run `op` until it succeeds, fails permanently, runs out of retries, or
/// the context is cancelled
///
/// Only [`RpcError::is_retryable`] errors are retried. Cancellation wins
/// over an in-flight attempt or backoff sleep.
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    ctx: &DispatchContext,
    mut op: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RpcError>>,
{
    let mut attempts = 0u32;

    loop {
        if let Some(reason) = ctx.check() {
            return Err(RetryError::Cancelled(reason));
        }

        attempts += 1;
        let outcome = tokio::select! {
            reason = ctx.done() => return Err(RetryError::Cancelled(reason)),
            outcome = op() => outcome,
        };

        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_retryable() || attempts >= policy.max_attempts {
            return Err(RetryError::Failed {
                attempts,
                source: err,
            });
        }

        let delay = policy.backoff(attempts - 1);
        warn!("{}", err);
        info!(
            "Retrying HTTP request in {:?} (attempt {}/{})",
            delay,
            attempts + 1,
            policy.max_attempts
        );

        tokio::select! {
            reason = ctx.done() => return Err(RetryError::Cancelled(reason)),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
