//! Cached analysis records for artifacts and their blobs

use crate::types::{ArtifactType, DetectedLicense, Misconfiguration, Os, Package, SecretFinding};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schema version of [`ArtifactInfo`] records
pub const ARTIFACT_JSON_SCHEMA_VERSION: u32 = 1;

/// Schema version of [`BlobInfo`] records
pub const BLOB_JSON_SCHEMA_VERSION: u32 = 2;

/// Metadata for a top-level artifact such as a container image
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ArtifactInfo {
    pub schema_version: u32,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub architecture: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub docker_version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub os: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repo_tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repo_digests: Vec<String>,
}

/// Packages found in one package database file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PackageInfo {
    pub file_path: String,
    pub packages: Vec<Package>,
}

/// Libraries declared by one lockfile or manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Application {
    /// Ecosystem, e.g. `npm`, `gradle`, `cargo`
    pub r#type: String,
    pub file_path: String,
    pub libraries: Vec<Package>,
}

/// Policy results for one config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigFile {
    /// Config type, e.g. `kubernetes`, `dockerfile`
    pub file_type: String,
    pub file_path: String,
    pub misconfigurations: Vec<Misconfiguration>,
}

/// Secrets found in one file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecretFile {
    pub file_path: String,
    pub findings: Vec<SecretFinding>,
}

/// Analysis output for one content-addressed blob
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlobInfo {
    pub schema_version: u32,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub digest: String,

    #[serde(rename = "DiffID", default, skip_serializing_if = "String::is_empty")]
    pub diff_id: String,

    #[serde(rename = "OS", default, skip_serializing_if = "Option::is_none")]
    pub os: Option<Os>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub package_infos: Vec<PackageInfo>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applications: Vec<Application>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub misconfigurations: Vec<ConfigFile>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<SecretFile>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub licenses: Vec<DetectedLicense>,
}

impl BlobInfo {
    /// Empty record stamped with the current schema version
    pub fn new(diff_id: impl Into<String>) -> Self {
        Self {
            schema_version: BLOB_JSON_SCHEMA_VERSION,
            diff_id: diff_id.into(),
            ..Default::default()
        }
    }
}

/// Identity of an inspected artifact, as handed to a scan driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactReference {
    pub name: String,
    pub r#type: ArtifactType,
    /// Cache key of the artifact record
    pub id: String,
    /// Cache keys of the blobs, in layer order
    pub blob_ids: Vec<String>,
}
