//! bayesbench command-line interface
//!
//! Usage:
//!   bayesbench run --config experiment.json [--datasets DIR] [--excel FILE] [--json FILE]
//!   bayesbench list-models
//!   bayesbench list-datasets [--datasets DIR]

use anyhow::{Context, Result};
use bayesbench::dataset::{CachedProvider, DatasetProvider, DirectoryProvider};
use bayesbench::experiment::{ExperimentSpec, Orchestrator, RunReport};
use bayesbench::report::{ConsoleReport, ExcelReportWriter, JsonReportWriter, ReportWriter};
use bayesbench::{ClassifierRegistry, Settings};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bayesbench")]
#[command(about = "Cross-validated benchmarking of Bayesian-network and generic classifiers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run an experiment description
    Run(RunArgs),
    /// List registered classifiers
    ListModels,
    /// List the datasets of a directory
    ListDatasets {
        /// Dataset directory (default: BAYESBENCH_DATASETS or ./datasets)
        #[arg(long)]
        datasets: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Experiment description (JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// Dataset directory (default: BAYESBENCH_DATASETS or ./datasets)
    #[arg(long)]
    datasets: Option<PathBuf>,

    /// Workbook to write (default: <output>/<run id>.xlsx)
    #[arg(long)]
    excel: Option<PathBuf>,

    /// Also write the full report as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Worker threads (default: BAYESBENCH_WORKERS or all cores)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Do not print the summary table
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    match cli.command {
        Command::Run(args) => run(args, settings).await,
        Command::ListModels => {
            list_models();
            Ok(())
        }
        Command::ListDatasets { datasets } => {
            let dir = datasets.unwrap_or(settings.datasets);
            let provider = DirectoryProvider::new(&dir)
                .with_context(|| format!("cannot open dataset directory {}", dir.display()))?;
            for name in provider.names() {
                println!("{name}");
            }
            Ok(())
        }
    }
}

async fn run(args: RunArgs, settings: Settings) -> Result<()> {
    let spec = ExperimentSpec::from_path(&args.config)?;
    let dir = dataset_dir(&args, &settings);
    let provider = DirectoryProvider::new(&dir)
        .with_context(|| format!("cannot open dataset directory {}", dir.display()))?;
    info!(config = %args.config.display(), datasets = %dir.display(), "loading experiment");

    let orchestrator = Orchestrator::new(
        Arc::new(spec),
        ClassifierRegistry::with_builtins(),
        Arc::new(CachedProvider::new(provider)),
    )
    .with_platform(settings.platform.clone())
    .with_workers(args.workers.or(settings.workers));

    let cancel = orchestrator.cancellation();
    let stop = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("stop requested: finishing running trials, no new ones will start");
            cancel.cancel();
        }
    });
    let outcome = tokio::task::spawn_blocking(move || orchestrator.run())
        .await
        .context("orchestrator thread failed")?;
    stop.abort();
    let report = outcome?;

    write_reports(&report, &args, &settings)?;
    if report.cancelled {
        warn!(groups = report.groups.len(), "run cancelled; partial report written");
    }
    Ok(())
}

fn dataset_dir(args: &RunArgs, settings: &Settings) -> PathBuf {
    args.datasets
        .clone()
        .unwrap_or_else(|| settings.datasets.clone())
}

fn write_reports(report: &RunReport, args: &RunArgs, settings: &Settings) -> Result<()> {
    if !args.quiet {
        ConsoleReport::new(std::io::stdout().lock()).write(report)?;
    }

    let excel = args
        .excel
        .clone()
        .unwrap_or_else(|| settings.output_file(format!("{}.xlsx", report.record.run_id())));
    ensure_parent(&excel)?;
    ExcelReportWriter::new(&excel).write(report)?;
    info!(path = %excel.display(), "workbook written");

    if let Some(json) = &args.json {
        ensure_parent(json)?;
        JsonReportWriter::new(json).write(report)?;
        info!(path = %json.display(), "json report written");
    }
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create report directory {}", parent.display()))?;
    }
    Ok(())
}

fn list_models() {
    let registry = ClassifierRegistry::with_builtins();
    println!("{:<18} {:<14} {:<14} {}", "Name", "Probabilities", "Discrete only", "Hyperparameters");
    for name in registry.names() {
        let Ok(classifier) = registry.create(&name) else {
            continue;
        };
        let caps = classifier.capabilities();
        println!(
            "{:<18} {:<14} {:<14} {}",
            name,
            caps.probabilities,
            caps.discrete_only,
            classifier.valid_hyperparameters().join(", ")
        );
    }
}
