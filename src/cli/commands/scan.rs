//! Scan command - scan analyzer output in-process

use crate::cli::args::ScanArgs;
use crate::cli::commands::common::{
    artifact_source, inspect_options, interruptible_context, open_local_cache, render_results,
    write_options,
};
use crate::config::{CacheBackend, Config};
use crate::error::ScanfoldResult;
use crate::scanner::{Inspector, LocalScanner, Scanner};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

/// Execute the scan command
pub async fn execute(args: ScanArgs, config: &Config) -> ScanfoldResult<ExitCode> {
    // Fail on bad render flags before doing any analysis
    let options = write_options(&args.render, config)?;

    let backend = args
        .cache_backend
        .map(CacheBackend::from)
        .unwrap_or(config.cache.backend);
    let cache = open_local_cache(&config.cache, backend).await?;

    let source = artifact_source(&args.target)?;
    let scanner = Scanner::new(
        Inspector::new(cache.writer, inspect_options(&args.target)),
        Arc::new(LocalScanner::new(cache.reader)),
    );

    let ctx = interruptible_context();
    let report = scanner
        .scan_artifact(&ctx, &source, &args.target.scan_options(&config.report))
        .await?;
    info!(
        "Scanned {}: {} result(s)",
        report.artifact_name,
        report.results.len()
    );

    render_results(&report, &args.render, &options, config)
}
