//! Plumbing shared by the scanning and rendering commands

use crate::cache::{ArtifactCache, FailOpen, FsCache, LocalArtifactCache, MemoryCache};
use crate::cli::args::{RenderArgs, TargetArgs};
use crate::config::schema::CacheConfig;
use crate::config::{CacheBackend, Config};
use crate::error::{ScanfoldError, ScanfoldResult};
use crate::report::{write_results, WriteOptions};
use crate::rpc::DispatchContext;
use crate::scanner::{ArtifactSource, BlobFile, BlobSource, InspectOptions, ScanMode};
use crate::types::ScanReport;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a rendered report goes
pub fn open_output(render: &RenderArgs) -> ScanfoldResult<Box<dyn Write>> {
    match render.output {
        Some(ref path) => {
            let file = File::create(path)
                .map_err(|e| ScanfoldError::io(format!("creating {}", path.display()), e))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(io::stdout().lock())),
    }
}

/// Styled output only when writing to a color-capable terminal
pub fn colorize(render: &RenderArgs) -> bool {
    render.output.is_none() && console::colors_enabled()
}

/// Exit status for a rendered report
pub fn exit_status(failed: bool, exit_code: u8) -> ExitCode {
    if failed && exit_code != 0 {
        info!("Findings breach the failure threshold, exiting with {}", exit_code);
        ExitCode::from(exit_code)
    } else {
        ExitCode::SUCCESS
    }
}

/// Render options from flags and config, styled for the destination
pub fn write_options(render: &RenderArgs, config: &Config) -> ScanfoldResult<WriteOptions> {
    let mut options = render.write_options(&config.report)?;
    options.colorize = colorize(render);
    Ok(options)
}

/// Write a target report and map its findings to an exit status
pub fn render_results(
    report: &ScanReport,
    render: &RenderArgs,
    options: &WriteOptions,
    config: &Config,
) -> ScanfoldResult<ExitCode> {
    let mut out = open_output(render)?;
    write_results(&mut *out, report, options)?;
    out.flush()
        .map_err(|e| ScanfoldError::io("flushing report output", e))?;

    Ok(exit_status(report.failed(), render.exit_code(&config.report)))
}

/// A cache usable by both the inspector and the local driver
pub struct LocalCache {
    pub writer: Arc<dyn ArtifactCache>,
    pub reader: Arc<dyn LocalArtifactCache>,
    pub fs: Option<Arc<FailOpen<FsCache>>>,
}

/// Open the configured cache for in-process scanning
pub async fn open_local_cache(
    config: &CacheConfig,
    backend: CacheBackend,
) -> ScanfoldResult<LocalCache> {
    match backend {
        CacheBackend::Fs => {
            let dir = config.dir();
            debug!("Using filesystem cache at {}", dir.display());
            let cache = Arc::new(FailOpen::new(FsCache::new(&dir).await?));
            Ok(LocalCache {
                writer: cache.clone(),
                reader: cache.clone(),
                fs: Some(cache),
            })
        }
        CacheBackend::Memory => {
            let cache = Arc::new(FailOpen::new(MemoryCache::new()));
            Ok(LocalCache {
                writer: cache.clone(),
                reader: cache,
                fs: None,
            })
        }
        CacheBackend::Remote => Err(ScanfoldError::LocalCacheRequired(
            backend.as_str().to_string(),
        )),
    }
}

/// The artifact described by the command-line target
pub fn artifact_source(target: &TargetArgs) -> ScanfoldResult<ArtifactSource> {
    let blobs = target
        .blobs
        .iter()
        .map(|path| BlobFile::open(path).map(|b| Arc::new(b) as Arc<dyn BlobSource>))
        .collect::<ScanfoldResult<Vec<_>>>()?;

    Ok(ArtifactSource::from_blobs(
        target.artifact_name(),
        target.artifact_type.into(),
        blobs,
    ))
}

pub fn inspect_options(target: &TargetArgs) -> InspectOptions {
    InspectOptions {
        disabled: ScanMode::from(target.mode).disabled_analyzers(),
        parallelism: target.parallel,
        ..Default::default()
    }
}

/// Dispatch context cancelled on Ctrl-C
pub fn interruptible_context() -> DispatchContext {
    let ctx = DispatchContext::new();
    let token = ctx.token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight requests");
            token.cancel();
        }
    });
    ctx
}
