//! Command-line interface for sentinel.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::analysis::CancellationFlag;
use crate::config::{self, Config, DEFAULT_TEMPLATE};
use crate::pairing::PairingService;
use crate::report;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Heuristic test coverage estimator for Dart and TypeScript projects.
///
/// Sentinel pairs each source file with its test file by naming convention,
/// extracts the functions the source defines and scores each one by how the
/// test refers to it. Nothing is executed: the result is an estimate.
#[derive(Parser)]
#[command(name = "sentinel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Estimate test coverage for a project
    #[command(visible_alias = "scan")]
    Analyze(AnalyzeArgs),
    /// Create a sentinel config file from the default template
    Init(InitArgs),
}

/// Arguments for the analyze command.
#[derive(Parser)]
pub struct AnalyzeArgs {
    /// Project root directory
    pub path: PathBuf,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// External Dart parser executable
    #[arg(long, env = "SENTINEL_DART_PARSER")]
    pub dart_parser: Option<PathBuf>,

    /// Seconds to wait for the external parser per file
    #[arg(long)]
    pub parser_timeout: Option<u64>,

    /// Number of worker threads
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Minimum overall coverage percentage (exit non-zero if below)
    #[arg(short, long)]
    pub min_coverage: Option<f64>,

    /// List per-function scores
    #[arg(short, long)]
    pub verbose: bool,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "sentinel.yaml")]
    pub output: PathBuf,
}

impl AnalyzeArgs {
    /// Apply command-line overrides on top of file values.
    fn apply(&self, config: &mut Config) {
        if let Some(parser) = &self.dart_parser {
            config.dart.parser = Some(parser.clone());
        }
        if let Some(secs) = self.parser_timeout {
            config.dart.timeout_secs = Some(secs);
        }
        if let Some(jobs) = self.jobs {
            config.jobs = Some(jobs);
        }
        if let Some(min) = self.min_coverage {
            config.min_coverage = Some(min);
        }
    }
}

/// Run the analyze command.
pub fn run_analyze(args: &AnalyzeArgs) -> anyhow::Result<i32> {
    if args.format != "pretty" && args.format != "json" {
        eprintln!(
            "Error: invalid format {:?}, must be 'pretty' or 'json'",
            args.format
        );
        return Ok(EXIT_ERROR);
    }

    let root = match args.path.canonicalize() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: cannot access path {:?}: {}", args.path, e);
            return Ok(EXIT_ERROR);
        }
    };
    if !root.is_dir() {
        eprintln!("Error: {} is not a directory", args.path.display());
        return Ok(EXIT_ERROR);
    }

    let (mut config, config_path) = match Config::load(args.config.as_deref(), &root) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return Ok(EXIT_ERROR);
        }
    };
    args.apply(&mut config);

    if let Err(e) = config::validate(&config) {
        eprintln!("Error: invalid config: {}", e);
        return Ok(EXIT_ERROR);
    }

    let cancel = CancellationFlag::new();
    let factory = config.analyzer_factory(&cancel);
    let scanner = config.scanner()?;

    let report = PairingService::new(&root, &factory)
        .with_cancellation(cancel)
        .with_jobs(config.jobs)
        .run(&scanner)?;

    let path_str = args.path.to_string_lossy().to_string();
    let config_str = config_path.map(|p| p.to_string_lossy().to_string());

    match args.format.as_str() {
        "json" => report::write_json(&report)?,
        _ => report::write_pretty(
            &path_str,
            config_str.as_deref(),
            &report,
            args.verbose,
            config.min_coverage,
        ),
    }

    if report.meets(config.min_coverage) {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_FAILED)
    }
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    if args.output.exists() {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Remove it or use --output to specify a different path");
        return Ok(EXIT_ERROR);
    }

    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("Error: failed to create directory: {}", e);
                return Ok(EXIT_ERROR);
            }
        }
    }

    if let Err(e) = std::fs::write(&args.output, DEFAULT_TEMPLATE) {
        eprintln!("Error: failed to write config: {}", e);
        return Ok(EXIT_ERROR);
    }

    println!("Created {}", args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to customize for your project", args.output.display());
    println!("  2. Run: sentinel analyze . --config {}", args.output.display());

    Ok(EXIT_SUCCESS)
}
