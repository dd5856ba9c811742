//! Serverless scan driver: merge cached blobs and run detection in-process

use crate::cache::LocalArtifactCache;
use crate::error::{ScanfoldError, ScanfoldResult};
use crate::rpc::DispatchContext;
use crate::types::{
    Application, ConfigFile, DetectedLicense, DetectedVulnerability, MisconfSummary, Os, Package,
    ResultClass, Results, ScanOptions, ScanResult, SecretFile, SecurityCheck, VulnType,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Target name of the result that collects loose license findings
pub const LICENSE_TARGET: &str = "Loose File License(s)";

/// Matches packages against a vulnerability database
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect_os(
        &self,
        os: &Os,
        packages: &[Package],
    ) -> ScanfoldResult<Vec<DetectedVulnerability>>;

    async fn detect_library(
        &self,
        app_type: &str,
        libraries: &[Package],
    ) -> ScanfoldResult<Vec<DetectedVulnerability>>;
}

/// The state of the filesystem after all blobs are applied in order
#[derive(Debug, Default)]
pub struct ArtifactDetail {
    pub os: Option<Os>,
    pub packages: BTreeMap<String, Vec<Package>>,
    pub applications: BTreeMap<String, Application>,
    pub misconfigurations: BTreeMap<String, ConfigFile>,
    pub secrets: BTreeMap<String, SecretFile>,
    pub licenses: Vec<DetectedLicense>,
}

pub struct LocalScanner {
    cache: Arc<dyn LocalArtifactCache>,
    detector: Option<Arc<dyn Detector>>,
}

impl LocalScanner {
    pub fn new(cache: Arc<dyn LocalArtifactCache>) -> Self {
        Self {
            cache,
            detector: None,
        }
    }

    pub fn with_detector(mut self, detector: Arc<dyn Detector>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Load blobs in layer order; a file path in a later blob replaces the
    /// same path from earlier ones
    pub async fn apply_layers(&self, blob_keys: &[String]) -> ScanfoldResult<ArtifactDetail> {
        let mut detail = ArtifactDetail::default();

        for key in blob_keys {
            let blob = self
                .cache
                .get_blob(key)
                .await?
                .ok_or_else(|| ScanfoldError::BlobNotFound(key.clone()))?;

            if blob.os.is_some() {
                detail.os = blob.os;
            }
            for info in blob.package_infos {
                detail.packages.insert(info.file_path, info.packages);
            }
            for app in blob.applications {
                detail.applications.insert(app.file_path.clone(), app);
            }
            for config in blob.misconfigurations {
                detail.misconfigurations.insert(config.file_path.clone(), config);
            }
            for secret in blob.secrets {
                detail.secrets.insert(secret.file_path.clone(), secret);
            }
            detail.licenses.extend(blob.licenses);
        }

        Ok(detail)
    }

    pub async fn scan(
        &self,
        ctx: &DispatchContext,
        target: &str,
        _artifact_key: &str,
        blob_keys: &[String],
        options: &ScanOptions,
    ) -> ScanfoldResult<(Results, Option<Os>)> {
        if let Some(reason) = ctx.check() {
            return Err(ScanfoldError::Cancelled {
                target: target.to_string(),
                reason,
            });
        }

        let detail = self.apply_layers(blob_keys).await?;
        let mut results = Results::new();

        if let Some(result) = self.os_result(target, &detail, options).await? {
            results.push(result);
        }
        results.extend(self.library_results(&detail, options).await?);

        if options.is_enabled(SecurityCheck::Config) {
            results.extend(detail.misconfigurations.values().map(|config| ScanResult {
                target: config.file_path.clone(),
                class: ResultClass::Config,
                r#type: config.file_type.clone(),
                misconf_summary: Some(MisconfSummary::from_misconfigurations(
                    &config.misconfigurations,
                )),
                misconfigurations: config.misconfigurations.clone(),
                ..Default::default()
            }));
        }

        if options.is_enabled(SecurityCheck::Secret) {
            results.extend(
                detail
                    .secrets
                    .values()
                    .filter(|secret| !secret.findings.is_empty())
                    .map(|secret| ScanResult {
                        target: secret.file_path.clone(),
                        class: ResultClass::Secret,
                        secrets: secret.findings.clone(),
                        ..Default::default()
                    }),
            );
        }

        if options.is_enabled(SecurityCheck::License) && !detail.licenses.is_empty() {
            results.push(ScanResult {
                target: LICENSE_TARGET.to_string(),
                class: ResultClass::License,
                licenses: detail.licenses.clone(),
                ..Default::default()
            });
        }

        Ok((results, detail.os))
    }

    async fn os_result(
        &self,
        target: &str,
        detail: &ArtifactDetail,
        options: &ScanOptions,
    ) -> ScanfoldResult<Option<ScanResult>> {
        let wants_vulns = options.wants_vulns(VulnType::Os);
        if !wants_vulns && !options.list_all_packages {
            return Ok(None);
        }
        let Some(os) = &detail.os else {
            debug!("OS is not detected in {}", target);
            return Ok(None);
        };
        if os.eosl {
            warn!("This OS version is no longer supported by the distribution: {} {}", os.family, os.name);
        }

        let packages: Vec<Package> = detail.packages.values().flatten().cloned().collect();
        let os_target = format!("{} ({} {})", target, os.family, os.name);

        let vulnerabilities = match (&self.detector, wants_vulns) {
            (Some(detector), true) => detector.detect_os(os, &packages).await.map_err(|e| {
                ScanfoldError::Detection {
                    target: os_target.clone(),
                    reason: e.to_string(),
                }
            })?,
            _ => Vec::new(),
        };

        Ok(Some(ScanResult {
            target: os_target,
            class: ResultClass::OsPkgs,
            r#type: os.family.clone(),
            packages: if options.list_all_packages {
                packages
            } else {
                Vec::new()
            },
            vulnerabilities,
            ..Default::default()
        }))
    }

    async fn library_results(
        &self,
        detail: &ArtifactDetail,
        options: &ScanOptions,
    ) -> ScanfoldResult<Vec<ScanResult>> {
        let wants_vulns = options.wants_vulns(VulnType::Library);
        if !wants_vulns && !options.list_all_packages {
            return Ok(Vec::new());
        }

        let mut results = Vec::with_capacity(detail.applications.len());
        for app in detail.applications.values() {
            let vulnerabilities = match (&self.detector, wants_vulns) {
                (Some(detector), true) => detector
                    .detect_library(&app.r#type, &app.libraries)
                    .await
                    .map_err(|e| ScanfoldError::Detection {
                        target: app.file_path.clone(),
                        reason: e.to_string(),
                    })?,
                _ => Vec::new(),
            };

            results.push(ScanResult {
                target: app.file_path.clone(),
                class: ResultClass::LangPkgs,
                r#type: app.r#type.clone(),
                packages: if options.list_all_packages {
                    app.libraries.clone()
                } else {
                    Vec::new()
                },
                vulnerabilities,
                ..Default::default()
            });
        }
        Ok(results)
    }
}
