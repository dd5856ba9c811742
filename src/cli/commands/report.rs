//! Report command - render a cluster report

use crate::cli::args::ReportArgs;
use crate::cli::commands::common::{exit_status, open_output, write_options};
use crate::config::Config;
use crate::error::{ScanfoldError, ScanfoldResult};
use crate::report::{write_k8s, Report};
use std::io::Write;
use std::process::ExitCode;
use tokio::fs;
use tracing::debug;

/// Execute the report command
pub async fn execute(args: ReportArgs, config: &Config) -> ScanfoldResult<ExitCode> {
    let mut options = write_options(&args.render, config)?;
    if let Some(ref kind) = args.report {
        options.report = kind.parse()?;
    }

    let content = fs::read_to_string(&args.file)
        .await
        .map_err(|e| ScanfoldError::io(format!("reading {}", args.file.display()), e))?;
    let report: Report = serde_json::from_str(&content)?;
    debug!(
        "Loaded cluster report {}: {} vulnerability and {} misconfiguration resource(s)",
        report.cluster_name,
        report.vulnerabilities.len(),
        report.misconfigurations.len()
    );

    let mut out = open_output(&args.render)?;
    write_k8s(&mut *out, &report, &options)?;
    out.flush()
        .map_err(|e| ScanfoldError::io("flushing report output", e))?;

    Ok(exit_status(
        report.failed(),
        args.render.exit_code(&config.report),
    ))
}
