use anyhow::{Context, Result};
use aquasim_core::directory::InfrastructureDirectory;
use aquasim_core::events::EventPublisher;
use aquasim_core::inventory::FeedInventory;
use aquasim_core::ledger::AssignmentLedger;
use aquasim_core::logger::EventCsvLogger;
use aquasim_core::orchestrator::{
    self, ExecuteConfig, ExecutionContext, PlanConfig, DEFAULT_SATURATION,
};
use aquasim_core::projection::ProjectionStore;
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod config;
mod report;

/// Batch lifecycle simulator for salmon farming operations.
#[derive(Debug, Parser)]
#[command(name = "aquasim", version, about)]
struct Cli {
    /// Run the planned batches (the default is a dry run).
    #[arg(long, conflicts_with = "dry_run")]
    execute: bool,

    /// Plan only: print and persist the schedule without simulating.
    #[arg(long)]
    dry_run: bool,

    /// Number of batches to plan (defaults to the saturation target).
    #[arg(long, value_name = "N")]
    batches: Option<usize>,

    /// Target fraction of container capacity to occupy.
    #[arg(long, default_value_t = DEFAULT_SATURATION)]
    saturation: f64,

    /// First batch start date (YYYY-MM-DD).
    #[arg(long, value_name = "YYYY-MM-DD", default_value = "2025-01-01")]
    start_date: NaiveDate,

    /// Parallel worker count (defaults to cpu_count - 2).
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Per-batch wall-clock timeout in minutes.
    #[arg(long, default_value_t = 60)]
    batch_timeout_minutes: u64,

    /// Directory holding the YAML knowledge base (built-in defaults when
    /// omitted).
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Output directory for the schedule, event log and report artifacts.
    #[arg(long, value_name = "DIR", default_value = "./runs")]
    out_dir: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    println!("--- AquaSim ---");

    let kb = match &cli.data_dir {
        Some(dir) => config::KnowledgeBase::load(dir)?,
        None => config::KnowledgeBase::builtin(),
    };
    let directory = Arc::new(InfrastructureDirectory::seed(&kb.site_layout));

    let mut plan_cfg = PlanConfig::new(cli.start_date);
    plan_cfg.saturation = cli.saturation;
    plan_cfg.batch_count_override = cli.batches;
    plan_cfg.geographies = kb
        .site_layout
        .geographies
        .iter()
        .map(|g| g.geography_id.clone())
        .collect();

    let schedule = match orchestrator::plan(&directory, &plan_cfg) {
        Ok(schedule) => schedule,
        Err(err) => {
            eprintln!("error: {}", err);
            return Ok(ExitCode::from(2));
        }
    };

    std::fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("Failed to create {}", cli.out_dir.display()))?;
    let schedule_path = cli.out_dir.join("schedule.yaml");
    orchestrator::save_schedule(&schedule, &schedule_path)?;
    println!(
        "Planned {} batches across {} geographies -> {}",
        schedule.batches.len(),
        plan_cfg.geographies.len(),
        schedule_path.display()
    );

    if cli.dry_run || !cli.execute {
        for batch in schedule.batches.iter().take(10) {
            println!(
                "  {} {} station {} start {}",
                batch.batch_number, batch.geography_id, batch.station_index, batch.start_date
            );
        }
        if schedule.batches.len() > 10 {
            println!("  ... and {} more", schedule.batches.len() - 10);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let publisher: Arc<dyn EventPublisher> =
        Arc::new(EventCsvLogger::new(&cli.out_dir.join("events.csv"))?);
    let ctx = ExecutionContext {
        directory,
        ledger: Arc::new(AssignmentLedger::new()),
        inventory: Arc::new(FeedInventory::new()),
        projections: Arc::new(ProjectionStore::new()),
        models_by_geography: kb.models_by_geography,
        feeds: kb.feeds,
        feed_policy: kb.feed_policy,
        temperature_by_geography: kb.temperature_by_geography,
        publisher,
    };
    let exec_cfg = ExecuteConfig {
        workers: cli.workers,
        batch_timeout: Duration::from_secs(cli.batch_timeout_minutes * 60),
        ..ExecuteConfig::default()
    };

    let run_report = orchestrator::execute(&schedule, &ctx, &exec_cfg)?;
    report::write_report(&run_report, &cli.out_dir)?;

    println!(
        "\n{} batches finished ({} failed) in {:.1}s; {} events; results in '{}'",
        run_report.summary.batches_completed,
        run_report.summary.batches_failed,
        run_report.summary.wall_time_seconds,
        run_report.summary.total_events,
        cli.out_dir.display()
    );

    if run_report.summary.batches_failed > 0 {
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}
