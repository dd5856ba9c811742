//! Cluster reports: per-resource findings and their consolidation
//!
//! A cluster scan yields a vulnerability-side and a misconfiguration-side
//! [`Resource`] for the same Kubernetes object. [`Report::consolidate`]
//! folds them into one entry per object identity.

use crate::report::announce::AnnounceOnce;
use crate::report::summary::SeverityCount;
use crate::report::table::TableWriter;
use crate::report::{ReportKind, WriteOptions};
use crate::types::{Results, ScanReport, Severity, TYPE_KUBERNETES};
use console::style;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, Write};
use tabled::{settings::Style, Table, Tabled};

/// Identity of a scanned cluster object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct K8sArtifact {
    #[serde(default)]
    pub namespace: String,
    pub kind: String,
    pub name: String,
}

/// Findings for one cluster object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    pub kind: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Results::is_empty")]
    pub results: Results,

    /// Scan failure scoped to this object only
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,

    /// The scan report the results were taken from
    #[serde(skip)]
    pub report: ScanReport,
}

impl Resource {
    /// Build a resource from one object's scan
    ///
    /// Results of type `kubernetes` are retargeted to `<kind>/<name>`; their
    /// original target is a temporary manifest file.
    pub fn from_scan(artifact: &K8sArtifact, report: ScanReport, error: Option<String>) -> Self {
        let results = report
            .results
            .iter()
            .cloned()
            .map(|mut result| {
                if result.r#type == TYPE_KUBERNETES {
                    result.target = format!("{}/{}", artifact.kind, artifact.name);
                }
                result
            })
            .collect();

        Self {
            namespace: artifact.namespace.clone(),
            kind: artifact.kind.clone(),
            name: artifact.name.clone(),
            results,
            error: error.unwrap_or_default(),
            report,
        }
    }

    /// Case-insensitive identity key, `namespace/kind/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}/{}", self.namespace, self.kind, self.name).to_lowercase()
    }

    /// Fold `incoming` into `self`, keeping this entry's identity and error
    fn absorb(&mut self, incoming: Resource) {
        self.results.extend(incoming.results.into_inner());
    }
}

/// Report of a cluster scan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Report {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub schema_version: u32,

    #[serde(default)]
    pub cluster_name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vulnerabilities: Vec<Resource>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub misconfigurations: Vec<Resource>,
}

/// One entry per object identity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConsolidatedReport {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub schema_version: u32,

    #[serde(default)]
    pub cluster_name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<Resource>,
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

impl Report {
    /// True if any resource on either side fails its own threshold
    pub fn failed(&self) -> bool {
        self.vulnerabilities
            .iter()
            .chain(&self.misconfigurations)
            .any(|r| r.results.failed())
    }

    /// Merge both sides into one entry per identity
    ///
    /// Misconfiguration resources are indexed first. A resource whose key is
    /// already indexed is merged into the existing entry: the existing
    /// namespace, kind, name and error are kept and the results become
    /// `existing ++ incoming`. The order of `findings` is unspecified; use
    /// [`ConsolidatedReport::sorted`] when stable output is needed.
    pub fn consolidate(&self) -> ConsolidatedReport {
        let mut index: HashMap<String, Resource> = HashMap::new();

        for resource in self.misconfigurations.iter().chain(&self.vulnerabilities) {
            let key = resource.full_name();
            match index.get_mut(&key) {
                Some(existing) => existing.absorb(resource.clone()),
                None => {
                    let mut entry = resource.clone();
                    entry.report = ScanReport::default();
                    index.insert(key, entry);
                }
            }
        }

        ConsolidatedReport {
            schema_version: self.schema_version,
            cluster_name: self.cluster_name.clone(),
            findings: index.into_values().collect(),
        }
    }

    /// Both sides, each ordered by identity key
    pub fn sorted(mut self) -> Self {
        self.vulnerabilities.sort_by_cached_key(Resource::full_name);
        self.misconfigurations.sort_by_cached_key(Resource::full_name);
        self
    }
}

impl ConsolidatedReport {
    /// Findings ordered by identity key
    pub fn sorted(mut self) -> Self {
        self.findings.sort_by_cached_key(Resource::full_name);
        self
    }

    pub fn failed(&self) -> bool {
        self.findings.iter().any(|r| r.results.failed())
    }
}

/// Per-resource counts for the summary report
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceSummary {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    pub kind: String,
    pub name: String,
    pub vulnerabilities: SeverityCount,
    pub misconfigurations: SeverityCount,
    pub secrets: SeverityCount,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl ResourceSummary {
    pub fn from_resource(resource: &Resource, allowed: &[Severity]) -> Self {
        let mut summary = Self {
            namespace: resource.namespace.clone(),
            kind: resource.kind.clone(),
            name: resource.name.clone(),
            error: resource.error.clone(),
            ..Default::default()
        };

        for result in &resource.results {
            let keep = |s: &Severity| allowed.contains(s);
            for v in result.vulnerabilities.iter().filter(|v| keep(&v.severity)) {
                *summary.vulnerabilities.entry(v.severity).or_default() += 1;
            }
            for m in result
                .misconfigurations
                .iter()
                .filter(|m| m.is_failure() && keep(&m.severity))
            {
                *summary.misconfigurations.entry(m.severity).or_default() += 1;
            }
            for s in result.secrets.iter().filter(|s| keep(&s.severity)) {
                *summary.secrets.entry(s.severity).or_default() += 1;
            }
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SummaryReport {
    cluster_name: String,
    resources: Vec<ResourceSummary>,
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Vulnerabilities")]
    vulnerabilities: String,
    #[tabled(rename = "Misconfigurations")]
    misconfigurations: String,
    #[tabled(rename = "Secrets")]
    secrets: String,
    #[tabled(rename = "Error")]
    error: String,
}

/// `C:1 H:2` for the allowed severities, highest risk first
fn count_cell(counts: &SeverityCount, allowed: &[Severity]) -> String {
    let parts: Vec<String> = Severity::ALL
        .iter()
        .rev()
        .filter(|s| allowed.contains(s))
        .filter_map(|s| {
            let count = counts.get(s).copied().unwrap_or(0);
            (count > 0).then(|| format!("{}:{}", &s.as_str()[..1], count))
        })
        .collect();

    if parts.is_empty() {
        "-".to_string()
    } else {
        parts.join(" ")
    }
}

/// Write a cluster report as JSON
///
/// `all` writes both sides as scanned; `summary` writes per-resource counts.
pub fn write_json(out: &mut dyn Write, report: &Report, options: &WriteOptions) -> io::Result<()> {
    match options.report {
        ReportKind::All => serde_json::to_writer_pretty(&mut *out, &report.clone().sorted())?,
        ReportKind::Summary => {
            let consolidated = report.consolidate().sorted();
            let summary = SummaryReport {
                cluster_name: consolidated.cluster_name.clone(),
                resources: consolidated
                    .findings
                    .iter()
                    .map(|r| ResourceSummary::from_resource(r, &options.severities))
                    .collect(),
            };
            serde_json::to_writer_pretty(&mut *out, &summary)?;
        }
    }
    writeln!(out)
}

/// Write a cluster report as tables
pub fn write_table(
    out: &mut dyn Write,
    report: &Report,
    options: &WriteOptions,
    announce: &AnnounceOnce,
) -> io::Result<()> {
    let consolidated = report.consolidate().sorted();

    match options.report {
        ReportKind::All => {
            let writer = options.table_writer(announce);
            for resource in &consolidated.findings {
                let heading = if resource.namespace.is_empty() {
                    format!("{}/{}", resource.kind, resource.name)
                } else {
                    format!("{}/{}/{}", resource.namespace, resource.kind, resource.name)
                };
                if options.colorize {
                    writeln!(out, "\n{}", style(&heading).bold())?;
                } else {
                    writeln!(out, "\n{}", heading)?;
                }
                if !resource.error.is_empty() {
                    let line = format!("Error: {}", resource.error);
                    if options.colorize {
                        writeln!(out, "{}", style(line).red())?;
                    } else {
                        writeln!(out, "{}", line)?;
                    }
                }
                writer.write(out, &resource.results)?;
            }
        }
        ReportKind::Summary => {
            writeln!(out, "Summary Report for {}", consolidated.cluster_name)?;
            writeln!(out, "{}", "=".repeat(19 + consolidated.cluster_name.chars().count()))?;

            let rows: Vec<SummaryRow> = consolidated
                .findings
                .iter()
                .map(|resource| {
                    let summary = ResourceSummary::from_resource(resource, &options.severities);
                    SummaryRow {
                        namespace: resource.namespace.clone(),
                        resource: format!("{}/{}", resource.kind, resource.name),
                        vulnerabilities: count_cell(&summary.vulnerabilities, &options.severities),
                        misconfigurations: count_cell(
                            &summary.misconfigurations,
                            &options.severities,
                        ),
                        secrets: count_cell(&summary.secrets, &options.severities),
                        error: resource.error.clone(),
                    }
                })
                .collect();

            let mut table = Table::new(rows);
            table.with(Style::modern());
            writeln!(out, "{}", table)?;
            writeln!(out, "Severities: C=CRITICAL H=HIGH M=MEDIUM L=LOW U=UNKNOWN")?;
        }
    }
    Ok(())
}
