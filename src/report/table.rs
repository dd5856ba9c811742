//! Terminal table rendering of per-target results

use crate::report::announce::AnnounceOnce;
use crate::report::summary::{count_severities, summary_line};
use crate::report::tree::origin_tree;
use crate::types::{
    DetectedVulnerability, MisconfStatus, MisconfSummary, Misconfiguration, ResultClass, Results,
    ScanResult, SecretFinding, Severity,
};
use console::style;
use std::io::{self, Write};
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};
use tracing::info;

/// Titles longer than this many words are cut off
const TITLE_MAX_WORDS: usize = 12;

pub const PKG_PATH_HINT: &str = "Table result includes only package filenames. Use '--format json' option to get the full path to the package file.";

#[derive(Tabled)]
struct VulnerabilityRow {
    #[tabled(rename = "Library")]
    library: String,
    #[tabled(rename = "Vulnerability")]
    vulnerability: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Installed Version")]
    installed_version: String,
    #[tabled(rename = "Fixed Version")]
    fixed_version: String,
    #[tabled(rename = "Title")]
    title: String,
}

#[derive(Tabled)]
struct SecretRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Line No")]
    line: usize,
    #[tabled(rename = "Match")]
    matched: String,
}

/// Paint a value in the color of `severity`
pub fn colorize_severity(value: &str, severity: Severity) -> String {
    let styled = style(value);
    let styled = match severity {
        Severity::Unknown => styled.cyan(),
        Severity::Low => styled.blue(),
        Severity::Medium => styled.yellow(),
        Severity::High => styled.red().bright(),
        Severity::Critical => styled.red(),
    };
    styled.to_string()
}

/// Renders results as a header, a summary line and a findings table per
/// target
pub struct TableWriter<'a> {
    /// Severities counted in summary lines
    pub severities: Vec<Severity>,
    /// Show the dependency origin tree
    pub tree: bool,
    /// List passed and excepted misconfigurations too
    pub include_non_failures: bool,
    /// Print policy evaluation traces
    pub trace: bool,
    /// Emit ANSI styling
    pub colorize: bool,
    pub announce: &'a AnnounceOnce,
}

impl<'a> TableWriter<'a> {
    pub fn new(severities: Vec<Severity>, announce: &'a AnnounceOnce) -> Self {
        Self {
            severities,
            tree: false,
            include_non_failures: false,
            trace: false,
            colorize: false,
            announce,
        }
    }

    pub fn write(&self, out: &mut dyn Write, results: &Results) -> io::Result<()> {
        for result in results {
            if result.class == ResultClass::Custom {
                continue;
            }
            self.write_result(out, result)?;
        }
        Ok(())
    }

    fn write_result(&self, out: &mut dyn Write, result: &ScanResult) -> io::Result<()> {
        let mut target = result.target.clone();
        match result.class {
            ResultClass::Config if result.misconfigurations.is_empty() => return Ok(()),
            ResultClass::Secret if result.secrets.is_empty() => return Ok(()),
            ResultClass::Secret => target.push_str(" (secrets)"),
            ResultClass::OsPkgs => {}
            _ => target.push_str(&format!(" ({})", result.r#type)),
        }

        let counts = count_severities(result);

        if self.colorize {
            writeln!(out, "\n{}\n", style(&target).bold().underlined())?;
        } else {
            writeln!(out, "\n{}", target)?;
            writeln!(out, "{}", "=".repeat(target.chars().count()))?;
        }

        if result.class == ResultClass::Config {
            let summary = result.misconf_summary.unwrap_or_else(|| {
                MisconfSummary::from_misconfigurations(&result.misconfigurations)
            });
            writeln!(
                out,
                "Tests: {} (SUCCESSES: {}, FAILURES: {}, EXCEPTIONS: {})",
                summary.total(),
                summary.successes,
                summary.failures,
                summary.exceptions
            )?;
            writeln!(out, "{}\n", summary_line("Failures", &counts, &self.severities))?;
        } else {
            writeln!(out, "{}\n", summary_line("Total", &counts, &self.severities))?;
        }

        if !result.vulnerabilities.is_empty() {
            writeln!(out, "{}", self.vulnerability_table(&result.vulnerabilities))?;
        } else if !result.secrets.is_empty() {
            writeln!(out, "{}", self.secret_table(&result.secrets))?;
        }

        if !result.misconfigurations.is_empty() {
            self.write_misconfigurations(out, &result.misconfigurations)?;
        }

        if self.tree {
            let colorize = self.colorize;
            let highlight = move |label: &str| {
                if colorize {
                    style(label).red().bright().to_string()
                } else {
                    label.to_string()
                }
            };
            if let Some(tree) = origin_tree(result, &self.severities, highlight) {
                writeln!(out, "{}", tree)?;
            }
        }

        if self.trace {
            self.write_traces(out, result)?;
        }

        Ok(())
    }

    fn severity_cell(&self, severity: Severity) -> String {
        if self.colorize {
            colorize_severity(severity.as_str(), severity)
        } else {
            severity.to_string()
        }
    }

    fn vulnerability_table(&self, vulns: &[DetectedVulnerability]) -> String {
        let rows: Vec<VulnerabilityRow> = vulns
            .iter()
            .map(|v| {
                let mut library = v.pkg_name.clone();
                if !v.pkg_path.is_empty() {
                    let file_name = Path::new(&v.pkg_path)
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| v.pkg_path.clone());
                    library = format!("{} ({})", v.pkg_name, file_name);
                    self.announce.announce(|| info!("{}", PKG_PATH_HINT));
                }

                VulnerabilityRow {
                    library,
                    vulnerability: v.vulnerability_id.clone(),
                    severity: self.severity_cell(v.severity),
                    installed_version: v.installed_version.clone(),
                    fixed_version: v.fixed_version.clone(),
                    title: self.title(v),
                }
            })
            .collect();

        let mut table = Table::new(rows);
        table.with(Style::modern());
        table.to_string()
    }

    fn title(&self, v: &DetectedVulnerability) -> String {
        let raw = if v.title.is_empty() {
            &v.description
        } else {
            &v.title
        };

        let words: Vec<&str> = raw.split(' ').collect();
        let mut title = if words.len() >= TITLE_MAX_WORDS {
            format!("{}...", words[..TITLE_MAX_WORDS].join(" "))
        } else {
            raw.clone()
        };

        if !v.primary_url.is_empty() {
            let url = if self.colorize {
                style(&v.primary_url).blue().to_string()
            } else {
                v.primary_url.clone()
            };
            title = format!("{}\n{}", title, url);
        }
        title.trim().to_string()
    }

    fn secret_table(&self, secrets: &[SecretFinding]) -> String {
        let rows: Vec<SecretRow> = secrets
            .iter()
            .map(|s| SecretRow {
                category: s.category.clone(),
                description: s.title.clone(),
                severity: self.severity_cell(s.severity),
                line: s.start_line,
                matched: s.r#match.clone(),
            })
            .collect();

        let mut table = Table::new(rows);
        table.with(Style::modern());
        table.to_string()
    }

    fn write_misconfigurations(
        &self,
        out: &mut dyn Write,
        misconfs: &[Misconfiguration],
    ) -> io::Result<()> {
        for misconf in misconfs {
            let heading = match misconf.status {
                MisconfStatus::Fail => {
                    let message = if misconf.message.is_empty() {
                        &misconf.title
                    } else {
                        &misconf.message
                    };
                    format!("{}: {}", self.severity_cell(misconf.severity), message)
                }
                _ if !self.include_non_failures => continue,
                MisconfStatus::Pass => format!("PASS: {}", misconf.title),
                MisconfStatus::Exception => format!("EXCEPTION: {}", misconf.title),
            };

            writeln!(out, "{} ({})", heading, misconf.id)?;
            writeln!(out, "{}", "═".repeat(40))?;
            if !misconf.description.is_empty() {
                writeln!(out, "{}", misconf.description)?;
            }
            if !misconf.resolution.is_empty() {
                writeln!(out, "\nResolution: {}", misconf.resolution)?;
            }
            if !misconf.primary_url.is_empty() {
                writeln!(out, "\nSee {}", misconf.primary_url)?;
            }
            writeln!(out, "{}\n", "─".repeat(40))?;
        }
        Ok(())
    }

    fn write_traces(&self, out: &mut dyn Write, result: &ScanResult) -> io::Result<()> {
        for misconf in result.misconfigurations.iter().filter(|m| !m.traces.is_empty()) {
            let paint = |line: String| {
                if !self.colorize {
                    line
                } else if misconf.is_failure() {
                    style(line).red().to_string()
                } else {
                    style(line).green().to_string()
                }
            };

            writeln!(out, "{}", paint(format!("\nID: {}", misconf.id)))?;
            writeln!(out, "{}", paint(format!("File: {}", result.target)))?;
            writeln!(out, "{}", paint(format!("Namespace: {}", misconf.namespace)))?;
            writeln!(out, "{}", paint(format!("Query: {}", misconf.query)))?;
            writeln!(out, "{}", paint(format!("Message: {}", misconf.message)))?;
            for trace in &misconf.traces {
                let label = if self.colorize {
                    style("TRACE ").blue().to_string()
                } else {
                    "TRACE ".to_string()
                };
                writeln!(out, "{} {}", label, trace)?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}
