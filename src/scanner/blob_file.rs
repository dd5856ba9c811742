//! Blobs backed by analyzer output files on disk
//!
//! Each file holds one [`BlobInfo`] as JSON, as written by an external
//! analyzer for one layer or filesystem snapshot. The blob's diff ID is the
//! digest of the file, so re-running the analyzer with identical output
//! hits the cache.

use crate::cache::key::digest_file;
use crate::cache::AnalyzerGroup;
use crate::error::{ScanfoldError, ScanfoldResult};
use crate::scanner::inspect::BlobSource;
use crate::types::BlobInfo;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct BlobFile {
    path: PathBuf,
    diff_id: String,
}

impl BlobFile {
    pub fn open(path: impl AsRef<Path>) -> ScanfoldResult<Self> {
        let path = path.as_ref().to_path_buf();
        let diff_id = digest_file(&path)?;
        Ok(Self { path, diff_id })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl BlobSource for BlobFile {
    fn diff_id(&self) -> &str {
        &self.diff_id
    }

    async fn analyze(&self, disabled: &[AnalyzerGroup]) -> ScanfoldResult<BlobInfo> {
        let content = tokio::fs::read(&self.path)
            .await
            .map_err(|e| ScanfoldError::io(format!("reading {}", self.path.display()), e))?;
        let mut info: BlobInfo =
            serde_json::from_slice(&content).map_err(|e| ScanfoldError::Analysis {
                key: self.diff_id.clone(),
                reason: format!("{}: {}", self.path.display(), e),
            })?;

        strip_disabled(&mut info, disabled);
        info.diff_id = self.diff_id.clone();
        Ok(info)
    }
}

/// Drop output of analyzer groups that are switched off
pub fn strip_disabled(info: &mut BlobInfo, disabled: &[AnalyzerGroup]) {
    for group in disabled {
        match group {
            AnalyzerGroup::IndividualPackages => info.package_infos.clear(),
            AnalyzerGroup::Lockfiles => info.applications.clear(),
            AnalyzerGroup::Config => info.misconfigurations.clear(),
            AnalyzerGroup::Secret => info.secrets.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Application, Package, PackageInfo};
    use tempfile::TempDir;

    fn sample() -> BlobInfo {
        BlobInfo {
            package_infos: vec![PackageInfo {
                file_path: "lib/apk/db/installed".to_string(),
                packages: vec![Package {
                    name: "musl".to_string(),
                    version: "1.2.4-r2".to_string(),
                    ..Default::default()
                }],
            }],
            applications: vec![Application {
                r#type: "npm".to_string(),
                file_path: "app/package-lock.json".to_string(),
                libraries: Vec::new(),
            }],
            ..BlobInfo::new("")
        }
    }

    #[tokio::test]
    async fn loads_and_filters_groups() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("layer.json");
        std::fs::write(&path, serde_json::to_vec(&sample()).unwrap()).unwrap();

        let blob = BlobFile::open(&path).unwrap();
        assert!(blob.diff_id().starts_with("sha256:"));

        let info = blob.analyze(&[AnalyzerGroup::Lockfiles]).await.unwrap();
        assert_eq!(info.package_infos.len(), 1);
        assert!(info.applications.is_empty());
        assert_eq!(info.diff_id, blob.diff_id());

        let info = blob.analyze(&[AnalyzerGroup::IndividualPackages]).await.unwrap();
        assert!(info.package_infos.is_empty());
        assert_eq!(info.applications.len(), 1);
    }

    #[tokio::test]
    async fn malformed_file_is_analysis_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, b"{not json").unwrap();

        let blob = BlobFile::open(&path).unwrap();
        let err = blob.analyze(&[]).await.unwrap_err();
        assert!(matches!(err, ScanfoldError::Analysis { .. }));
    }

    #[test]
    fn missing_file_fails_to_open() {
        assert!(BlobFile::open("/nonexistent/layer.json").is_err());
    }
}
