//! Client command - scan analyzer output on a remote scan server

use crate::cache::{FailOpen, RemoteCache};
use crate::cli::args::ClientArgs;
use crate::cli::commands::common::{
    artifact_source, inspect_options, interruptible_context, render_results, write_options,
};
use crate::config::Config;
use crate::error::{ScanfoldError, ScanfoldResult};
use crate::rpc::{CustomHeaders, HttpClient, RemoteScanner, ScanTransport};
use crate::scanner::{Inspector, Scanner};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};

/// Execute the client command
pub async fn execute(args: ClientArgs, config: &Config) -> ScanfoldResult<ExitCode> {
    let options = write_options(&args.render, config)?;

    let url = args
        .remote
        .clone()
        .or_else(|| config.remote.url.clone())
        .ok_or(ScanfoldError::RemoteNotConfigured)?;

    let mut transport = config.remote.transport();
    transport.insecure |= args.insecure;

    let mut headers = config.remote.custom_headers();
    for raw in &args.custom_headers {
        let (name, value) = CustomHeaders::parse_pair(raw)?;
        headers.insert(name, value);
    }
    debug!("Custom headers: {:?}", headers);

    let retry = config.remote.retry_policy();
    let ctx = interruptible_context();

    let cache_url = config.cache.remote_url.clone().unwrap_or_else(|| url.clone());
    let cache = RemoteCache::new(HttpClient::new(cache_url, &transport), headers.clone())
        .with_retry(retry.clone())
        .with_context(ctx.clone());

    let server: Arc<dyn ScanTransport> = Arc::new(HttpClient::new(url.as_str(), &transport));
    let driver = RemoteScanner::new(server, headers).with_retry(retry);

    let scanner = Scanner::new(
        Inspector::new(Arc::new(FailOpen::new(cache)), inspect_options(&args.target)),
        Arc::new(driver),
    );

    let source = artifact_source(&args.target)?;
    info!("Scanning {} on {}", source.name, url);
    let report = scanner
        .scan_artifact(&ctx, &source, &args.target.scan_options(&config.report))
        .await?;

    render_results(&report, &args.render, &options, config)
}
