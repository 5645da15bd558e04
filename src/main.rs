//! wasm-bench CLI entry point.
//!
//! Loads a module, runs it on every configured engine variant and prints the
//! comparison report to stdout. Logs go to stderr.
//!
//! Exit codes:
//! - `0`: every variant succeeded and all return values agree
//! - `1`: at least one variant failed
//! - `2`: successful variants returned different values
//! - `3`: configuration or input error

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use wasm_bench_common::{BackendKind, BenchConfig, ConfigFile, ReportFormat};
use wasm_bench_core::{
    BenchmarkRunner, Comparator, ComparisonReport, ModuleSource, Verdict, render_json,
    render_text,
};
use wasm_bench_engines::DefaultEngineFactory;

/// Exit code for configuration and input errors.
const EXIT_CONFIG_ERROR: u8 = 3;

/// Cross-engine WebAssembly benchmarking harness.
#[derive(Debug, Parser)]
#[command(name = "wasm-bench", version, about)]
struct Args {
    /// Module to benchmark (`.wasm` binary or `.wat` text).
    #[arg(short, long, env = "WASM_BENCH_FILE")]
    file: PathBuf,

    /// Steady-state iterations per variant.
    #[arg(short = 'n', long, env = "WASM_BENCH_ITERATIONS")]
    iterations: Option<u32>,

    /// TOML configuration file.
    #[arg(short, long, env = "WASM_BENCH_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for persisted compilation artifacts. Must already exist.
    #[arg(long, env = "WASM_BENCH_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Linear memory limit in 64 KiB pages.
    #[arg(long, env = "WASM_BENCH_MEMORY_LIMIT_PAGES")]
    memory_limit_pages: Option<u32>,

    /// Only run these backends (repeatable).
    #[arg(short, long = "backend", value_name = "BACKEND")]
    backends: Vec<BackendKind>,

    /// Report format.
    #[arg(long, value_enum, env = "WASM_BENCH_FORMAT")]
    format: Option<OutputFormat>,

    /// Log format on stderr.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, env = "WASM_BENCH_LOG_FORMAT")]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => ReportFormat::Text,
            OutputFormat::Json => ReportFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.log_format);

    match run(&args) {
        Ok(verdict) => ExitCode::from(verdict.exit_code()),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,wasm_bench=info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

fn run(args: &Args) -> anyhow::Result<Verdict> {
    let (config, format) = load_config(args)?;
    let variants = config.variants()?;

    let module = load_module(&args.file)?;
    if !module.has_wasm_header() {
        warn!(path = %args.file.display(), "Module does not start with the wasm magic header");
    }

    info!(
        module = %args.file.display(),
        module_hash = %module.content_hash(),
        iterations = config.iteration_count,
        variants = variants.len(),
        "Starting comparison"
    );

    // A broken cache directory aborts here, before any variant runs.
    let factory = DefaultEngineFactory::from_config(&config.engine)?;
    let runner = BenchmarkRunner::new(config.iteration_count)?;
    let comparator = Comparator::new(factory, runner);

    let report = comparator.compare(&variants, &module);
    print_report(&report, format)?;

    let verdict = report.verdict();
    match verdict {
        Verdict::Agreement => info!(run_id = %report.run_id, "All variants agree"),
        Verdict::Failures => warn!(
            run_id = %report.run_id,
            failed = report.failures().count(),
            "Some variants failed"
        ),
        Verdict::Divergence => error!(run_id = %report.run_id, "Return values diverge"),
    }

    Ok(verdict)
}

/// Merge the config file (if any) with command-line overrides.
fn load_config(args: &Args) -> anyhow::Result<(BenchConfig, ReportFormat)> {
    let file = match &args.config {
        Some(path) => ConfigFile::from_file(path)?,
        None => ConfigFile::default(),
    };

    let mut config = file.bench;
    if let Some(iterations) = args.iterations {
        config.iteration_count = iterations;
    }
    if let Some(pages) = args.memory_limit_pages {
        config.engine.memory_limit_pages = pages;
    }
    if let Some(dir) = &args.cache_dir {
        config.engine.cache_dir = Some(dir.clone());
    }
    if !args.backends.is_empty() {
        config.restrict_to(&args.backends);
    }

    config.validate()?;

    let format = args.format.map_or(file.report.format, ReportFormat::from);
    Ok((config, format))
}

/// Read module bytes, converting WAT text when needed.
fn load_module(path: &Path) -> anyhow::Result<ModuleSource> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read module '{}'", path.display()))?;

    let is_text = path.extension().is_some_and(|ext| ext == "wat");
    let bytes = if is_text {
        wat::parse_bytes(&bytes)
            .with_context(|| format!("Failed to parse WAT module '{}'", path.display()))?
            .into_owned()
    } else {
        bytes
    };

    Ok(ModuleSource::new(bytes))
}

fn print_report(report: &ComparisonReport, format: ReportFormat) -> anyhow::Result<()> {
    match format {
        ReportFormat::Text => print!("{}", render_text(report)),
        ReportFormat::Json => println!("{}", render_json(report)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "wasm-bench",
            "-f",
            "module.wasm",
            "-n",
            "50",
            "-b",
            "aot",
            "--backend",
            "interpreter",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(args.file, PathBuf::from("module.wasm"));
        assert_eq!(args.iterations, Some(50));
        assert_eq!(args.backends, vec![BackendKind::Aot, BackendKind::Interpreter]);
        assert!(matches!(args.format, Some(OutputFormat::Json)));
        assert_eq!(args.log_format, LogFormat::Text);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let err = Args::try_parse_from(["wasm-bench", "-f", "m.wasm", "-b", "v8"]).unwrap_err();
        assert!(err.to_string().contains("unknown backend"));
    }

    #[test]
    fn test_cli_overrides_defaults() {
        let args = Args::try_parse_from([
            "wasm-bench",
            "-f",
            "m.wasm",
            "-n",
            "5",
            "--memory-limit-pages",
            "128",
            "-b",
            "tinywasm",
        ])
        .unwrap();

        let (config, format) = load_config(&args).unwrap();
        assert_eq!(config.iteration_count, 5);
        assert_eq!(config.engine.memory_limit_pages, 128);
        assert_eq!(config.variants.len(), 1);
        assert_eq!(format, ReportFormat::Text);
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let args = Args::try_parse_from(["wasm-bench", "-f", "m.wasm", "-n", "0"]).unwrap();
        let err = load_config(&args).unwrap_err();
        assert!(err.to_string().contains("iteration_count"));
    }

    #[test]
    fn test_missing_module_file() {
        let err = load_module(Path::new("/nonexistent/module.wasm")).unwrap_err();
        assert!(err.to_string().contains("Failed to read module"));
    }
}
