//! Finding records produced by the out-of-process analyzers and matchers
//!
//! Field names follow the report JSON layout (`PascalCase`, with `ID`/`URL`
//! acronyms kept upper-case) so reports written by other tools load as-is.

use crate::types::Severity;
use serde::{Deserialize, Serialize};

/// An installed package or library dependency
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Package {
    /// Ecosystem-specific identifier, e.g. `lodash@4.17.20`
    #[serde(rename = "ID", default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub version: String,

    /// Whether the package is a transitive dependency
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub indirect: bool,

    /// IDs of packages this package depends on directly
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub licenses: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file_path: String,
}

/// Operating system detected in an artifact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Os {
    pub family: String,
    pub name: String,

    /// End of service life
    #[serde(rename = "EOSL", default, skip_serializing_if = "std::ops::Not::not")]
    pub eosl: bool,
}

/// A vulnerability matched against an installed package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DetectedVulnerability {
    #[serde(rename = "VulnerabilityID")]
    pub vulnerability_id: String,

    #[serde(rename = "PkgID", default, skip_serializing_if = "String::is_empty")]
    pub pkg_id: String,

    pub pkg_name: String,

    /// Path to the file the package was found in (jar, wheel, ...)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pkg_path: String,

    #[serde(default)]
    pub installed_version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub fixed_version: String,

    #[serde(default)]
    pub severity: Severity,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(rename = "PrimaryURL", default, skip_serializing_if = "String::is_empty")]
    pub primary_url: String,
}

/// Outcome of a single policy check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MisconfStatus {
    Pass,
    #[default]
    Fail,
    Exception,
}

/// Result of evaluating one policy against one config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Misconfiguration {
    #[serde(default)]
    pub r#type: String,

    #[serde(rename = "ID")]
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub query: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resolution: String,

    #[serde(default)]
    pub severity: Severity,

    #[serde(rename = "PrimaryURL", default, skip_serializing_if = "String::is_empty")]
    pub primary_url: String,

    #[serde(default)]
    pub status: MisconfStatus,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traces: Vec<String>,
}

impl Misconfiguration {
    pub fn is_failure(&self) -> bool {
        self.status == MisconfStatus::Fail
    }
}

/// Pass/fail tallies for a config target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MisconfSummary {
    pub successes: usize,
    pub failures: usize,
    pub exceptions: usize,
}

impl MisconfSummary {
    /// Tally statuses of a misconfiguration list
    pub fn from_misconfigurations(misconfs: &[Misconfiguration]) -> Self {
        let mut summary = Self::default();
        for misconf in misconfs {
            match misconf.status {
                MisconfStatus::Pass => summary.successes += 1,
                MisconfStatus::Fail => summary.failures += 1,
                MisconfStatus::Exception => summary.exceptions += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.successes + self.failures + self.exceptions
    }
}

/// A hard-coded credential found in a file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecretFinding {
    #[serde(rename = "RuleID")]
    pub rule_id: String,

    #[serde(default)]
    pub category: String,

    #[serde(default)]
    pub severity: Severity,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub start_line: usize,

    #[serde(default)]
    pub end_line: usize,

    /// Matched line with the secret itself masked
    #[serde(default)]
    pub r#match: String,
}

/// A license detected on a package or file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DetectedLicense {
    #[serde(default)]
    pub severity: Severity,

    #[serde(default)]
    pub category: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pkg_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file_path: String,

    pub name: String,

    #[serde(default)]
    pub confidence: f32,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub link: String,
}
