//! Data model shared by the cache, drivers and report writers

pub mod artifact;
pub mod finding;
pub mod options;
pub mod result;
pub mod severity;

pub use artifact::{
    Application, ArtifactInfo, ArtifactReference, BlobInfo, ConfigFile, PackageInfo, SecretFile,
    ARTIFACT_JSON_SCHEMA_VERSION, BLOB_JSON_SCHEMA_VERSION,
};
pub use finding::{
    DetectedLicense, DetectedVulnerability, MisconfStatus, MisconfSummary, Misconfiguration, Os,
    Package, SecretFinding,
};
pub use options::{ScanOptions, SecurityCheck, VulnType};
pub use result::{
    ArtifactType, ResultClass, Results, ScanReport, ScanResult, SCHEMA_VERSION, TYPE_KUBERNETES,
};
pub use severity::Severity;
