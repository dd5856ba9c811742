//! CLI argument definitions using clap derive

use crate::config::schema::{CacheBackend, ReportConfig};
use crate::error::ScanfoldResult;
use crate::report::WriteOptions;
use crate::scanner::ScanMode;
use crate::types::{ArtifactType, ScanOptions, SecurityCheck, Severity, VulnType};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// scanfold - vulnerability, misconfiguration and secret scan pipeline
///
/// Caches per-layer analysis by content digest, dispatches scans to a
/// remote server, and aggregates results into consolidated reports.
#[derive(Parser, Debug)]
#[command(name = "scanfold")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SCANFOLD_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a cluster report, consolidating per-resource findings
    Report(ReportArgs),

    /// Render a target report
    Results(ResultsArgs),

    /// Scan analyzer output locally, using the analysis cache
    Scan(ScanArgs),

    /// Scan analyzer output on a remote scan server
    Client(ClientArgs),

    /// Inspect or clear the analysis cache
    Cache(CacheArgs),

    /// Show configuration
    Config(ConfigArgs),
}

/// Rendering flags; unset flags fall back to the `[report]` config section
#[derive(Args, Debug, Default, Clone)]
pub struct RenderArgs {
    /// Output format: table or json
    #[arg(short, long)]
    pub format: Option<String>,

    /// Severities to report, comma-separated (e.g. HIGH,CRITICAL)
    #[arg(short, long)]
    pub severity: Option<String>,

    /// Show the dependency origin tree of vulnerable packages
    #[arg(long)]
    pub dependency_tree: bool,

    /// List passed and excepted misconfigurations too
    #[arg(long)]
    pub include_non_failures: bool,

    /// Print policy evaluation traces
    #[arg(long)]
    pub trace: bool,

    /// Exit with this code when findings breach the failure threshold
    #[arg(long)]
    pub exit_code: Option<u8>,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl RenderArgs {
    /// Merge flags over the configured defaults
    pub fn write_options(&self, defaults: &ReportConfig) -> ScanfoldResult<WriteOptions> {
        let mut options = defaults.write_options()?;
        if let Some(ref format) = self.format {
            options.format = format.parse()?;
        }
        if let Some(ref severity) = self.severity {
            options.severities = Severity::parse_list(severity)?;
        }
        options.dependency_tree |= self.dependency_tree;
        options.include_non_failures |= self.include_non_failures;
        options.trace |= self.trace;
        Ok(options)
    }

    pub fn exit_code(&self, defaults: &ReportConfig) -> u8 {
        self.exit_code.unwrap_or(defaults.exit_code)
    }
}

/// Arguments for the report command
#[derive(Parser, Debug)]
pub struct ReportArgs {
    /// Cluster report JSON file
    pub file: PathBuf,

    /// Report type: all or summary
    #[arg(short, long)]
    pub report: Option<String>,

    #[command(flatten)]
    pub render: RenderArgs,
}

/// Arguments for the results command
#[derive(Parser, Debug)]
pub struct ResultsArgs {
    /// Target report JSON file
    pub file: PathBuf,

    #[command(flatten)]
    pub render: RenderArgs,
}

/// Artifact kinds accepted on the command line
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum ArtifactKind {
    #[default]
    Image,
    Filesystem,
    Repository,
}

impl From<ArtifactKind> for ArtifactType {
    fn from(kind: ArtifactKind) -> Self {
        match kind {
            ArtifactKind::Image => ArtifactType::ContainerImage,
            ArtifactKind::Filesystem => ArtifactType::Filesystem,
            ArtifactKind::Repository => ArtifactType::Repository,
        }
    }
}

/// Scan modes accepted on the command line
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum ModeArg {
    #[default]
    Image,
    Fs,
    Rootfs,
}

impl From<ModeArg> for ScanMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Image => ScanMode::Image,
            ModeArg::Fs => ScanMode::Filesystem,
            ModeArg::Rootfs => ScanMode::Rootfs,
        }
    }
}

/// Which artifact to scan and what to look for
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Analyzer output files (BlobInfo JSON), one per layer, in layer order
    #[arg(required = true)]
    pub blobs: Vec<PathBuf>,

    /// Artifact name shown in the report (defaults to the first file name)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Artifact type
    #[arg(long, value_enum, default_value = "image")]
    pub artifact_type: ArtifactKind,

    /// Scan mode; selects which analyzer groups are disabled
    #[arg(long, value_enum, default_value = "image")]
    pub mode: ModeArg,

    /// Security checks, comma-separated: vuln, config, secret, license
    #[arg(long, value_delimiter = ',', value_parser = parse_security_check)]
    pub security_checks: Vec<SecurityCheck>,

    /// Vulnerability types, comma-separated: os, library
    #[arg(long, value_delimiter = ',', value_parser = parse_vuln_type)]
    pub vuln_type: Vec<VulnType>,

    /// Include packages without findings
    #[arg(long)]
    pub list_all_packages: bool,

    /// Blobs analyzed concurrently
    #[arg(long, default_value_t = crate::scanner::DEFAULT_PARALLELISM)]
    pub parallel: usize,
}

impl TargetArgs {
    pub fn scan_options(&self, defaults: &ReportConfig) -> ScanOptions {
        let mut options = ScanOptions::default();
        if !self.security_checks.is_empty() {
            options.security_checks = self.security_checks.clone();
        }
        if !self.vuln_type.is_empty() {
            options.vuln_type = self.vuln_type.clone();
        }
        options.list_all_packages = self.list_all_packages || defaults.list_all_packages;
        options
    }

    pub fn artifact_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.blobs
                .first()
                .and_then(|p| p.file_stem())
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }
}

/// Arguments for the scan command
#[derive(Parser, Debug)]
pub struct ScanArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Cache backend override: fs or memory
    #[arg(long, value_enum)]
    pub cache_backend: Option<BackendArg>,

    #[command(flatten)]
    pub render: RenderArgs,
}

/// Arguments for the client command
#[derive(Parser, Debug)]
pub struct ClientArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Scan server URL (overrides `[remote] url`)
    #[arg(long, env = "SCANFOLD_REMOTE")]
    pub remote: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long)]
    pub insecure: bool,

    /// Extra request header, `Name: value` (repeatable)
    #[arg(long = "custom-header")]
    pub custom_headers: Vec<String>,

    #[command(flatten)]
    pub render: RenderArgs,
}

/// Cache backends selectable on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum BackendArg {
    Fs,
    Memory,
}

impl From<BackendArg> for CacheBackend {
    fn from(backend: BackendArg) -> Self {
        match backend {
            BackendArg::Fs => CacheBackend::Fs,
            BackendArg::Memory => CacheBackend::Memory,
        }
    }
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for list commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cached entries
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Show which blobs of an artifact still need analysis
    Missing {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Remove every cached entry
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

fn parse_security_check(s: &str) -> Result<SecurityCheck, String> {
    SecurityCheck::parse(s).ok_or_else(|| {
        format!("unknown security check '{s}' (expected vuln, config, secret or license)")
    })
}

fn parse_vuln_type(s: &str) -> Result<VulnType, String> {
    VulnType::parse(s).ok_or_else(|| format!("unknown vulnerability type '{s}' (expected os or library)"))
}
