//! Cache command - inspect or clear the analysis cache

use crate::cache::fs::format_bytes;
use crate::cache::{CacheEntrySummary, LocalArtifactCache};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat, TargetArgs};
use crate::cli::commands::common::{artifact_source, inspect_options, open_local_cache};
use crate::config::Config;
use crate::error::ScanfoldResult;
use crate::scanner::Inspector;
use console::style;
use std::io::{self, Write};
use tabled::{settings::Style, Table, Tabled};

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> ScanfoldResult<()> {
    match args.action {
        CacheAction::List { format } => list_entries(config, format).await,
        CacheAction::Missing { target } => show_missing(config, &target).await,
        CacheAction::Clear { yes } => clear_cache(config, yes).await,
    }
}

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "KEY")]
    key: String,
    #[tabled(rename = "KIND")]
    kind: String,
    #[tabled(rename = "SIZE")]
    size: String,
    #[tabled(rename = "MODIFIED")]
    modified: String,
}

/// List stored entries of the filesystem cache
async fn list_entries(config: &Config, format: OutputFormat) -> ScanfoldResult<()> {
    let cache = open_local_cache(&config.cache, config.cache.backend).await?;
    let Some(fs) = cache.fs else {
        println!(
            "The {} cache backend keeps no persistent entries.",
            config.cache.backend.as_str()
        );
        return Ok(());
    };

    let entries = fs.inner().list().await?;
    if entries.is_empty() && !matches!(format, OutputFormat::Json) {
        println!("No cached entries in {}", fs.inner().root().display());
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_entry_table(&entries),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Plain => {
            for entry in &entries {
                println!("{}", entry.key);
            }
        }
    }

    Ok(())
}

fn print_entry_table(entries: &[CacheEntrySummary]) {
    let rows: Vec<EntryRow> = entries
        .iter()
        .map(|e| EntryRow {
            key: e.key.clone(),
            kind: e.kind.to_string(),
            size: format_bytes(e.size_bytes),
            modified: e
                .modified
                .map(|m| m.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    let total: u64 = entries.iter().map(|e| e.size_bytes).sum();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{}", table);
    println!();
    println!("Total: {} entry(ies), {}", entries.len(), format_bytes(total));
}

/// Report which blobs of an artifact would be analyzed on the next scan
async fn show_missing(config: &Config, target: &TargetArgs) -> ScanfoldResult<()> {
    let cache = open_local_cache(&config.cache, config.cache.backend).await?;
    let inspector = Inspector::new(cache.writer, inspect_options(target));
    let source = artifact_source(target)?;

    let (_, blob_keys) = inspector.keys(&source)?;
    let missing = inspector.missing(&source).await?;

    println!(
        "Artifact {}: {}",
        source.name,
        if missing.missing_artifact {
            style("missing").yellow().to_string()
        } else {
            style("cached").green().to_string()
        }
    );

    for (path, key) in target.blobs.iter().zip(&blob_keys) {
        let state = if missing.missing_blob_ids.contains(key) {
            style("missing").yellow().to_string()
        } else {
            style("cached").green().to_string()
        };
        println!("  {} {} [{}]", path.display(), key, state);
    }

    println!();
    println!(
        "{} of {} blob(s) need analysis",
        missing.missing_blob_ids.len(),
        blob_keys.len()
    );
    Ok(())
}

/// Remove every cached entry
async fn clear_cache(config: &Config, skip_confirm: bool) -> ScanfoldResult<()> {
    let cache = open_local_cache(&config.cache, config.cache.backend).await?;
    let Some(fs) = cache.fs else {
        println!("Nothing to clear for the {} backend.", config.cache.backend.as_str());
        return Ok(());
    };

    let entries = fs.inner().list().await?;
    if entries.is_empty() {
        println!("No cached entries to clear.");
        return Ok(());
    }

    println!(
        "This will remove {} cached entry(ies) from {}",
        entries.len(),
        fs.inner().root().display()
    );

    if !skip_confirm {
        print!("Are you sure? [y/N] ");
        let _ = io::stdout().flush();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            println!("Failed to read input, aborting.");
            return Ok(());
        }

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    fs.clear().await?;
    println!("{} cleared {} entry(ies)", style("✓").green(), entries.len());

    Ok(())
}
