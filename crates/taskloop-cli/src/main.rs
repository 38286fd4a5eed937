//! taskloop CLI - run a task catalog with retries and persist the results.

mod demo;
mod json_output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use taskloop_core::{ProgressEvent, RunSummary};
use taskloop_runner::{
    execute_run, generate, CatalogConfig, ConfigurationError, DirectoryStore, JsonLinesStore,
    RetryPolicy, RunError, RunStore, RunnerConfig, TaskRunner,
};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::demo::SimulationOptions;

const REFERENCE_CATALOG: &str = include_str!("../config/reference_catalog.json");

/// taskloop - bounded, retrying task runner
#[derive(Parser)]
#[command(name = "taskloop")]
#[command(about = "Run a task catalog with retries and persist the results", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a catalog and write a run record
    Run(RunArgs),

    /// Check a catalog without running it
    Validate {
        /// Catalog JSON file (defaults to the built-in reference catalog)
        #[arg(short, long)]
        catalog: Option<PathBuf>,
    },

    /// Print the tasks a catalog expands to, in queue order
    Catalog {
        /// Catalog JSON file (defaults to the built-in reference catalog)
        #[arg(short, long)]
        catalog: Option<PathBuf>,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Catalog JSON file (defaults to the built-in reference catalog)
    #[arg(short, long)]
    catalog: Option<PathBuf>,

    /// Number of concurrent workers
    #[arg(short, long, default_value_t = 1)]
    workers: usize,

    /// Total attempts per task, including the first
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    /// Pause before each retry, in milliseconds
    #[arg(long, default_value_t = 0)]
    retry_delay_ms: u64,

    /// Where run records are written
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Record layout
    #[arg(long, value_enum, default_value_t = StoreKind::Dir)]
    store: StoreKind,

    /// Probability that a simulated attempt fails (0.0 to 1.0)
    #[arg(long, default_value_t = 0.0)]
    failure_rate: f64,

    /// Category whose attempts always fail
    #[arg(long)]
    fail_category: Option<String>,

    /// Multiplier applied to simulated latencies
    #[arg(long, default_value_t = 1.0)]
    latency_scale: f64,

    /// Stream events as JSON lines on stdout
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    /// One JSON file per run
    Dir,
    /// One line per run in runs.jsonl
    Jsonl,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Validate { catalog } => {
            validate(catalog)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Catalog { catalog } => {
            print_catalog(catalog)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_catalog(path: Option<PathBuf>) -> Result<CatalogConfig, ConfigurationError> {
    match path {
        Some(path) => CatalogConfig::load(path),
        None => CatalogConfig::from_json(REFERENCE_CATALOG),
    }
}

async fn run(args: RunArgs) -> Result<ExitCode, Box<dyn std::error::Error>> {
    if args.json {
        json_output::enable_json_mode();
    }

    let catalog = load_catalog(args.catalog)?;
    let options = SimulationOptions {
        latency_scale: args.latency_scale,
        failure_rate: args.failure_rate,
        fail_category: args.fail_category,
    };
    options.validate(&catalog.categories)?;
    let registry = demo::registry(&options)?;
    let config = RunnerConfig::default()
        .with_workers(args.workers)
        .with_retry(RetryPolicy::fixed(
            args.max_attempts,
            Duration::from_millis(args.retry_delay_ms),
        ));

    let store: Box<dyn RunStore> = match args.store {
        StoreKind::Dir => Box::new(DirectoryStore::new(&args.log_dir)),
        StoreKind::Jsonl => Box::new(JsonLinesStore::new(args.log_dir.join("runs.jsonl"))),
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let runner = TaskRunner::new(config, registry).with_events(tx);

    let token = runner.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, letting in-flight attempts finish");
            token.cancel();
        }
    });

    json_output::emit_run_started(
        catalog.total as usize,
        runner.config().workers,
        runner.config().retry.max_attempts,
    );
    let reporter = tokio::spawn(report_progress(rx));

    let result = execute_run(&runner, &catalog, store.as_ref()).await;

    // Dropping the runner closes the event channel so the reporter drains and exits.
    drop(runner);
    if let Err(e) = reporter.await {
        warn!(error = %e, "Progress reporter terminated abnormally");
    }

    match result {
        Ok(persisted) => {
            print_summary(&persisted.summary);
            json_output::emit_run_persisted(persisted.summary.run_id.as_str(), &persisted.location);
            if !json_output::is_json_mode() {
                println!("Results saved to: {}", persisted.location.display());
            }
            Ok(exit_code(&persisted.summary))
        }
        Err(RunError::Persistence { source, summary }) => {
            print_summary(&summary);
            json_output::emit_error(&source.to_string());
            error!(error = %source, "Run record was not written");
            Err(source.into())
        }
        Err(RunError::Configuration(e)) => {
            json_output::emit_error(&e.to_string());
            Err(e.into())
        }
    }
}

/// Log coarse progress and forward events in JSON mode.
async fn report_progress(mut rx: mpsc::UnboundedReceiver<ProgressEvent>) {
    let mut last_decile = 0;
    while let Some(event) = rx.recv().await {
        json_output::emit_progress(&event);

        if !event.is_terminal() {
            continue;
        }
        let progress = event.progress;
        let decile = progress.resolved() * 10 / progress.total.max(1);
        if decile > last_decile {
            last_decile = decile;
            info!(
                resolved = progress.resolved(),
                total = progress.total,
                completed = progress.completed,
                failed = progress.failed,
                "Progress: {:.1}% complete",
                progress.percentage_complete()
            );
        }
    }
}

fn exit_code(summary: &RunSummary) -> ExitCode {
    ExitCode::from(exit_status(summary))
}

/// 0 when every task succeeded, 1 if any failed, 2 if the run stopped early.
fn exit_status(summary: &RunSummary) -> u8 {
    if summary.summary.failed > 0 {
        1
    } else if summary.summary.cancelled || summary.summary.not_run > 0 {
        2
    } else {
        0
    }
}

fn print_summary(summary: &RunSummary) {
    json_output::emit_run_finished(summary);
    if json_output::is_json_mode() {
        return;
    }

    let stats = &summary.summary;
    println!("Run {}", summary.run_id);
    println!("  Completed:      {}/{}", stats.completed, stats.total_tasks);
    println!("  Failed:         {}", stats.failed);
    println!("  Not run:        {}", stats.not_run);
    println!("  Success rate:   {:.1}%", stats.success_rate);
    println!("  Total time:     {:.2}s", stats.total_time);
    println!("  Avg task time:  {:.3}s", stats.average_task_time);
    if stats.cancelled {
        println!("  Interrupted before every task ran");
    }

    let failed: Vec<_> = summary.failed_tasks().collect();
    if !failed.is_empty() {
        println!("  Failed tasks:");
        for task in failed {
            println!(
                "    - {} ({} attempts): {}",
                task.id,
                task.attempts,
                task.last_error.as_deref().unwrap_or("unknown error")
            );
        }
    }
}

fn validate(path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_catalog(path)?;
    let catalog = generate(&config)?;
    demo::registry(&SimulationOptions::default())?.ensure_covers(catalog.categories())?;

    println!(
        "Catalog OK: {} tasks across {} categories",
        catalog.len(),
        catalog.categories().len()
    );
    println!("{:<20}  {:<8}  {:>5}", "CATEGORY", "PRIORITY", "TASKS");
    println!("{}", "-".repeat(37));
    for spec in catalog.categories() {
        println!(
            "{:<20}  {:<8}  {:>5}",
            spec.name.as_str(),
            spec.priority.as_str(),
            spec.count
        );
    }
    Ok(())
}

fn print_catalog(path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = generate(&load_catalog(path)?)?;

    println!("Tasks ({}):", catalog.len());
    println!("{:>4}  {:<24}  {:<8}  {}", "#", "ID", "PRIORITY", "NAME");
    println!("{}", "-".repeat(72));
    for task in catalog.queue_order() {
        println!(
            "{:>4}  {:<24}  {:<8}  {}",
            task.number,
            task.id.as_str(),
            task.priority.as_str(),
            task.name
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use taskloop_core::{CategorySpec, Priority, RunId, Task};

    enum Outcome {
        Succeeded,
        Failed,
        NotRun,
    }

    fn summary(outcomes: &[Outcome], cancelled: bool) -> RunSummary {
        let spec = CategorySpec::new("monitoring", outcomes.len() as u32, Priority::Medium);
        let tasks: Vec<Task> = outcomes
            .iter()
            .enumerate()
            .map(|(i, outcome)| {
                let mut task = Task::new(i as u32 + 1, &spec, i as u32 + 1);
                match outcome {
                    Outcome::Succeeded => {
                        task.start(1).unwrap();
                        task.succeed(Duration::from_millis(5), json!({})).unwrap();
                    }
                    Outcome::Failed => {
                        task.start(1).unwrap();
                        task.fail("boom", 1, Duration::from_millis(5)).unwrap();
                    }
                    Outcome::NotRun => {}
                }
                task
            })
            .collect();
        let now = Utc::now();
        RunSummary::from_tasks(
            RunId::generate(),
            now,
            now,
            Duration::from_millis(20),
            &tasks,
            cancelled,
        )
    }

    #[test]
    fn test_exit_status_all_succeeded() {
        let summary = summary(&[Outcome::Succeeded, Outcome::Succeeded], false);
        assert_eq!(exit_status(&summary), 0);
    }

    #[test]
    fn test_exit_status_any_failed() {
        let summary = summary(&[Outcome::Succeeded, Outcome::Failed], false);
        assert_eq!(exit_status(&summary), 1);
    }

    #[test]
    fn test_exit_status_interrupted() {
        let summary = summary(&[Outcome::Succeeded, Outcome::NotRun], true);
        assert_eq!(summary.summary.not_run, 1);
        assert_eq!(exit_status(&summary), 2);
    }

    #[test]
    fn test_exit_status_failure_outranks_interruption() {
        let summary = summary(&[Outcome::Failed, Outcome::NotRun], true);
        assert_eq!(exit_status(&summary), 1);
    }

    #[test]
    fn test_reference_catalog_parses() {
        let config = load_catalog(None).unwrap();
        assert_eq!(config.total, 100);
        assert!(generate(&config).is_ok());
    }
}
