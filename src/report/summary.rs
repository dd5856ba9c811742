//! Severity tallies and the `Total: n (...)` summary line

use crate::types::{ScanResult, Severity};
use std::collections::BTreeMap;

/// Count per severity; iterates in ascending risk order
pub type SeverityCount = BTreeMap<Severity, usize>;

/// Tally the findings of one result
///
/// Counts every vulnerability, every secret, and only the misconfigurations
/// that failed.
pub fn count_severities(result: &ScanResult) -> SeverityCount {
    let mut counts = SeverityCount::new();

    let misconfs = result
        .misconfigurations
        .iter()
        .filter(|m| m.is_failure())
        .map(|m| m.severity);
    let secrets = result.secrets.iter().map(|s| s.severity);
    let vulns = result.vulnerabilities.iter().map(|v| v.severity);

    for severity in misconfs.chain(secrets).chain(vulns) {
        *counts.entry(severity).or_default() += 1;
    }
    counts
}

/// Total and `SEV: n` parts for the allowed severities, lowest risk first
///
/// Allowed severities with no findings are listed with a zero count.
/// Severities outside `allowed` are left out of both the total and the
/// parts.
pub fn summarize(counts: &SeverityCount, allowed: &[Severity]) -> (usize, Vec<String>) {
    let mut total = 0;
    let mut parts = Vec::new();

    for severity in Severity::ALL {
        if !allowed.contains(&severity) {
            continue;
        }
        let count = counts.get(&severity).copied().unwrap_or(0);
        parts.push(format!("{}: {}", severity, count));
        total += count;
    }

    (total, parts)
}

/// `<label>: <n> (<SEV>: <count>, ...)`
pub fn summary_line(label: &str, counts: &SeverityCount, allowed: &[Severity]) -> String {
    let (total, parts) = summarize(counts, allowed);
    format!("{}: {} ({})", label, total, parts.join(", "))
}
