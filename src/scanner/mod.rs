//! Scan control flow
//!
//! An [`Inspector`] makes sure every blob of an artifact is in the cache,
//! analyzing only the missing ones. A [`Driver`] then turns the cached
//! blobs into results, either in-process ([`LocalScanner`]) or on a scan
//! server ([`RemoteScanner`]).

pub mod blob_file;
pub mod inspect;
pub mod local;

pub use blob_file::BlobFile;
pub use inspect::{ArtifactSource, BlobSource, InspectOptions, Inspector, DEFAULT_PARALLELISM};
pub use local::{Detector, LocalScanner};

use crate::cache::AnalyzerGroup;
use crate::error::{ScanfoldError, ScanfoldResult};
use crate::rpc::{DispatchContext, RemoteScanner};
use crate::types::{Os, Results, ScanOptions, ScanReport, SCHEMA_VERSION};
use async_trait::async_trait;
use futures_util::future::join_all;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

/// What kind of input is being scanned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScanMode {
    /// Container image layers
    #[default]
    Image,
    /// A source tree: lockfiles matter, installed-package databases do not
    Filesystem,
    /// An unpacked root filesystem: installed packages matter, lockfiles do not
    Rootfs,
}

impl ScanMode {
    /// Analyzer groups switched off in this mode
    pub fn disabled_analyzers(&self) -> Vec<AnalyzerGroup> {
        match self {
            Self::Image => Vec::new(),
            Self::Filesystem => vec![AnalyzerGroup::IndividualPackages],
            Self::Rootfs => vec![AnalyzerGroup::Lockfiles],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Filesystem => "fs",
            Self::Rootfs => "rootfs",
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanMode {
    type Err = ScanfoldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(Self::Image),
            "fs" | "filesystem" => Ok(Self::Filesystem),
            "rootfs" => Ok(Self::Rootfs),
            other => Err(ScanfoldError::Internal(format!(
                "unknown scan mode \"{}\"",
                other
            ))),
        }
    }
}

/// Produces results for an inspected artifact
#[async_trait]
pub trait Driver: Send + Sync {
    async fn scan(
        &self,
        ctx: &DispatchContext,
        target: &str,
        artifact_key: &str,
        blob_keys: &[String],
        options: &ScanOptions,
    ) -> ScanfoldResult<(Results, Option<Os>)>;

    fn driver_name(&self) -> &'static str;
}

#[async_trait]
impl Driver for LocalScanner {
    async fn scan(
        &self,
        ctx: &DispatchContext,
        target: &str,
        artifact_key: &str,
        blob_keys: &[String],
        options: &ScanOptions,
    ) -> ScanfoldResult<(Results, Option<Os>)> {
        LocalScanner::scan(self, ctx, target, artifact_key, blob_keys, options).await
    }

    fn driver_name(&self) -> &'static str {
        "local"
    }
}

#[async_trait]
impl Driver for RemoteScanner {
    async fn scan(
        &self,
        ctx: &DispatchContext,
        target: &str,
        artifact_key: &str,
        blob_keys: &[String],
        options: &ScanOptions,
    ) -> ScanfoldResult<(Results, Option<Os>)> {
        RemoteScanner::scan(self, ctx, target, artifact_key, blob_keys, options).await
    }

    fn driver_name(&self) -> &'static str {
        "remote"
    }
}

/// Inspector and driver wired together
pub struct Scanner {
    inspector: Inspector,
    driver: Arc<dyn Driver>,
}

impl Scanner {
    pub fn new(inspector: Inspector, driver: Arc<dyn Driver>) -> Self {
        Self { inspector, driver }
    }

    pub async fn scan_artifact(
        &self,
        ctx: &DispatchContext,
        source: &ArtifactSource,
        options: &ScanOptions,
    ) -> ScanfoldResult<ScanReport> {
        let reference = self.inspector.inspect(source).await?;
        info!(
            "Scanning {} with the {} driver",
            reference.name,
            self.driver.driver_name()
        );

        let (results, os) = self
            .driver
            .scan(
                ctx,
                &reference.name,
                &reference.id,
                &reference.blob_ids,
                options,
            )
            .await?;

        Ok(ScanReport {
            schema_version: SCHEMA_VERSION,
            artifact_name: reference.name,
            artifact_type: reference.r#type,
            os,
            results,
        })
    }

    /// Scan several artifacts concurrently
    ///
    /// A failure is reported for its own artifact only; the others still
    /// complete. Output order matches `sources`.
    pub async fn scan_all(
        &self,
        ctx: &DispatchContext,
        sources: &[ArtifactSource],
        options: &ScanOptions,
    ) -> Vec<ScanfoldResult<ScanReport>> {
        let outcomes = join_all(
            sources
                .iter()
                .map(|source| self.scan_artifact(ctx, source, options)),
        )
        .await;

        for (source, outcome) in sources.iter().zip(&outcomes) {
            if let Err(e) = outcome {
                warn!("Scan of {} failed: {}", source.name, e);
            }
        }
        outcomes
    }
}
