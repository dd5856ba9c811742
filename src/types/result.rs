//! Per-target scan results and the report that carries them

use crate::types::{
    DetectedLicense, DetectedVulnerability, MisconfSummary, Misconfiguration, Os, Package,
    SecretFinding,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Deref, DerefMut};

/// Current report schema version
pub const SCHEMA_VERSION: u32 = 2;

/// Kind of target a result describes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultClass {
    #[serde(rename = "os-pkgs")]
    OsPkgs,
    #[default]
    #[serde(rename = "lang-pkgs")]
    LangPkgs,
    #[serde(rename = "config")]
    Config,
    #[serde(rename = "secret")]
    Secret,
    #[serde(rename = "license")]
    License,
    #[serde(rename = "custom")]
    Custom,
}

impl fmt::Display for ResultClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OsPkgs => "os-pkgs",
            Self::LangPkgs => "lang-pkgs",
            Self::Config => "config",
            Self::Secret => "secret",
            Self::License => "license",
            Self::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// Target type used for Kubernetes manifests
pub const TYPE_KUBERNETES: &str = "kubernetes";

/// Findings for exactly one scan target
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScanResult {
    pub target: String,

    #[serde(default)]
    pub class: ResultClass,

    /// Ecosystem or config type, e.g. `alpine`, `npm`, `kubernetes`
    #[serde(default)]
    pub r#type: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<Package>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vulnerabilities: Vec<DetectedVulnerability>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub misconf_summary: Option<MisconfSummary>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub misconfigurations: Vec<Misconfiguration>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<SecretFinding>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub licenses: Vec<DetectedLicense>,
}

impl ScanResult {
    /// Whether this result alone breaches the failure threshold
    pub fn failed(&self) -> bool {
        !self.vulnerabilities.is_empty()
            || self.misconfigurations.iter().any(Misconfiguration::is_failure)
            || !self.secrets.is_empty()
    }
}

/// Ordered list of per-target results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Results(pub Vec<ScanResult>);

impl Results {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// True if any result has a vulnerability, a failed misconfiguration
    /// or a secret
    pub fn failed(&self) -> bool {
        self.0.iter().any(ScanResult::failed)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<ScanResult> {
        self.0
    }
}

impl Deref for Results {
    type Target = Vec<ScanResult>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Results {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Vec<ScanResult>> for Results {
    fn from(results: Vec<ScanResult>) -> Self {
        Self(results)
    }
}

impl FromIterator<ScanResult> for Results {
    fn from_iter<I: IntoIterator<Item = ScanResult>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Results {
    type Item = ScanResult;
    type IntoIter = std::vec::IntoIter<ScanResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Results {
    type Item = &'a ScanResult;
    type IntoIter = std::slice::Iter<'a, ScanResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Kind of top-level scan subject
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactType {
    #[default]
    ContainerImage,
    Filesystem,
    Repository,
}

/// Report for a single artifact (image, filesystem, ...)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScanReport {
    #[serde(default)]
    pub schema_version: u32,

    pub artifact_name: String,

    #[serde(default)]
    pub artifact_type: ArtifactType,

    #[serde(rename = "OS", default, skip_serializing_if = "Option::is_none")]
    pub os: Option<Os>,

    #[serde(default, skip_serializing_if = "Results::is_empty")]
    pub results: Results,
}

impl ScanReport {
    pub fn failed(&self) -> bool {
        self.results.failed()
    }
}
