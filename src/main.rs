//! scanfold CLI entry point
//!
//! Dispatches to subcommands.

use clap::Parser;
use console::style;
use scanfold::cli::{commands, Cli, Commands};
use scanfold::config::ConfigManager;
use scanfold::error::ScanfoldResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, json: bool) {
    // 0 = warn, 1 = info, 2+ = debug
    let filter = match verbose {
        0 => EnvFilter::new("scanfold=warn"),
        1 => EnvFilter::new("scanfold=info"),
        _ => EnvFilter::new("scanfold=debug"),
    };

    // Logs go to stderr so reports on stdout stay machine-readable
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .init();
    }
}

async fn run() -> ScanfoldResult<ExitCode> {
    let cli = Cli::parse();

    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };

    // Config command must work even when the file on disk is invalid
    if let Commands::Config(args) = cli.command {
        init_logging(cli.verbose, false);
        commands::config(args, &config_manager).await?;
        return Ok(ExitCode::SUCCESS);
    }

    // Invalid config aborts before any scanning
    let config = config_manager.load().await?;
    init_logging(cli.verbose, config.general.log_format == "json");
    debug!("Loaded config from {}", config_manager.path().display());

    match cli.command {
        Commands::Report(args) => commands::report(args, &config).await,
        Commands::Results(args) => commands::results(args, &config).await,
        Commands::Scan(args) => commands::scan(args, &config).await,
        Commands::Client(args) => commands::client(args, &config).await,
        Commands::Cache(args) => commands::cache(args, &config)
            .await
            .map(|()| ExitCode::SUCCESS),
        Commands::Config(_) => unreachable!("Config handled above"),
    }
}
