//! Report rendering
//!
//! Target reports go through [`write_results`], cluster reports through
//! [`write_k8s`]. Each call builds its own [`AnnounceOnce`] so one-shot hints
//! fire once per rendering pass.

pub mod announce;
pub mod json;
pub mod k8s;
pub mod summary;
pub mod table;
pub mod tree;

pub use announce::AnnounceOnce;
pub use k8s::{ConsolidatedReport, K8sArtifact, Report, Resource};
pub use summary::{count_severities, summarize, summary_line, SeverityCount};
pub use table::TableWriter;

use crate::error::{ScanfoldError, ScanfoldResult};
use crate::types::{ScanReport, Severity};
use std::fmt;
use std::io::Write;
use std::str::FromStr;

/// Output encoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Table,
    Json,
}

impl FromStr for Format {
    type Err = ScanfoldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            _ => Err(ScanfoldError::UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Amount of detail in a cluster report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportKind {
    #[default]
    All,
    Summary,
}

impl FromStr for ReportKind {
    type Err = ScanfoldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "summary" => Ok(Self::Summary),
            _ => Err(ScanfoldError::UnknownReport(s.to_string())),
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Summary => write!(f, "summary"),
        }
    }
}

/// Rendering options shared by every writer
#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub format: Format,
    pub report: ReportKind,
    pub severities: Vec<Severity>,
    pub dependency_tree: bool,
    pub include_non_failures: bool,
    pub trace: bool,
    pub colorize: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            format: Format::Table,
            report: ReportKind::All,
            severities: Severity::ALL.to_vec(),
            dependency_tree: false,
            include_non_failures: false,
            trace: false,
            colorize: false,
        }
    }
}

impl WriteOptions {
    /// A table writer configured from these options
    pub fn table_writer<'a>(&self, announce: &'a AnnounceOnce) -> TableWriter<'a> {
        TableWriter {
            tree: self.dependency_tree,
            include_non_failures: self.include_non_failures,
            trace: self.trace,
            colorize: self.colorize,
            ..TableWriter::new(self.severities.clone(), announce)
        }
    }
}

/// Render a target report
pub fn write_results(
    out: &mut dyn Write,
    report: &ScanReport,
    options: &WriteOptions,
) -> ScanfoldResult<()> {
    let rendered = match options.format {
        Format::Json => json::write(out, report),
        Format::Table => {
            let announce = AnnounceOnce::new();
            options.table_writer(&announce).write(out, &report.results)
        }
    };
    rendered.map_err(|e| ScanfoldError::io("writing report", e))
}

/// Render a cluster report
pub fn write_k8s(out: &mut dyn Write, report: &Report, options: &WriteOptions) -> ScanfoldResult<()> {
    let rendered = match options.format {
        Format::Json => k8s::write_json(out, report, options),
        Format::Table => {
            let announce = AnnounceOnce::new();
            k8s::write_table(out, report, options, &announce)
        }
    };
    rendered.map_err(|e| ScanfoldError::io("writing cluster report", e))
}
