//! Request/response bodies exchanged with the scan and cache servers
//!
//! Field names are part of the wire contract and are pinned with serde
//! attributes independent of the Rust field names.

use crate::cache::MissingBlobs;
use crate::types::{ArtifactInfo, BlobInfo, Os, Results, ScanOptions};
use serde::{Deserialize, Serialize};

/// Path of the scan endpoint relative to the server URL
pub const SCAN_PATH: &str = "/twirp/scanfold.scanner.v1.Scanner/Scan";

/// Cache service endpoints
pub const CACHE_PUT_ARTIFACT_PATH: &str = "/twirp/scanfold.cache.v1.Cache/PutArtifact";
pub const CACHE_PUT_BLOB_PATH: &str = "/twirp/scanfold.cache.v1.Cache/PutBlob";
pub const CACHE_MISSING_BLOBS_PATH: &str = "/twirp/scanfold.cache.v1.Cache/MissingBlobs";
pub const CACHE_DELETE_BLOBS_PATH: &str = "/twirp/scanfold.cache.v1.Cache/DeleteBlobs";

/// Scan options as sent over the wire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireScanOptions {
    #[serde(rename = "vulnType", default)]
    pub vuln_type: Vec<String>,

    #[serde(rename = "securityChecks", default)]
    pub security_checks: Vec<String>,

    #[serde(rename = "listAllPackages", default)]
    pub list_all_packages: bool,
}

impl From<&ScanOptions> for WireScanOptions {
    fn from(options: &ScanOptions) -> Self {
        Self {
            vuln_type: options
                .vuln_type
                .iter()
                .map(|t| t.as_str().to_string())
                .collect(),
            security_checks: options
                .security_checks
                .iter()
                .map(|c| c.as_str().to_string())
                .collect(),
            list_all_packages: options.list_all_packages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    #[serde(rename = "target")]
    pub target: String,

    #[serde(rename = "artifactId")]
    pub artifact_id: String,

    /// Blob keys in layer order
    #[serde(rename = "blobIds")]
    pub blob_ids: Vec<String>,

    #[serde(rename = "options")]
    pub options: WireScanOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResponse {
    #[serde(rename = "os", default, skip_serializing_if = "Option::is_none")]
    pub os: Option<Os>,

    #[serde(rename = "results", default)]
    pub results: Results,
}

/// Error body returned with non-2xx responses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: String,

    #[serde(default)]
    pub msg: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutArtifactRequest {
    #[serde(rename = "artifactId")]
    pub artifact_id: String,

    #[serde(rename = "artifactInfo")]
    pub artifact_info: ArtifactInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutBlobRequest {
    #[serde(rename = "diffId")]
    pub diff_id: String,

    #[serde(rename = "blobInfo")]
    pub blob_info: BlobInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingBlobsRequest {
    #[serde(rename = "artifactId")]
    pub artifact_id: String,

    #[serde(rename = "blobIds")]
    pub blob_ids: Vec<String>,
}

pub type MissingBlobsResponse = MissingBlobs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteBlobsRequest {
    #[serde(rename = "blobIds")]
    pub blob_ids: Vec<String>,
}

/// Empty acknowledgement body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Empty {}
