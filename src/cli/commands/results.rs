//! Results command - render a target report

use crate::cli::args::ResultsArgs;
use crate::cli::commands::common::{render_results, write_options};
use crate::config::Config;
use crate::error::{ScanfoldError, ScanfoldResult};
use crate::types::ScanReport;
use std::process::ExitCode;
use tokio::fs;

/// Execute the results command
pub async fn execute(args: ResultsArgs, config: &Config) -> ScanfoldResult<ExitCode> {
    let options = write_options(&args.render, config)?;

    let content = fs::read_to_string(&args.file)
        .await
        .map_err(|e| ScanfoldError::io(format!("reading {}", args.file.display()), e))?;
    let report: ScanReport = serde_json::from_str(&content)?;

    render_results(&report, &args.render, &options, config)
}
