//! Post-run artifacts: a JSON run summary and a per-batch metrics CSV.

use anyhow::{Context, Result};
use aquasim_core::orchestrator::RunReport;
use aquasim_core::simulation::state::BatchStatus;
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize)]
struct BatchMetricsRow<'a> {
    batch_number: &'a str,
    status: String,
    days_simulated: u32,
    final_stage: String,
    events_emitted: u64,
    transfers_executed: u64,
    mortality_total: u64,
    feed_consumed_kg: f64,
    termination_reason: &'a str,
}

pub fn write_report(report: &RunReport, out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory {}", out_dir.display()))?;

    let summary_path = out_dir.join("run_summary.json");
    let summary_json = serde_json::to_string_pretty(&report.summary)?;
    fs::write(&summary_path, summary_json)
        .with_context(|| format!("Failed to write {}", summary_path.display()))?;

    let metrics_path = out_dir.join("batch_metrics.csv");
    let mut writer = csv::Writer::from_path(&metrics_path)
        .with_context(|| format!("Failed to open {}", metrics_path.display()))?;
    for outcome in &report.outcomes {
        let status = match outcome.batch.status {
            BatchStatus::Active => "active",
            BatchStatus::Completed => "completed",
            BatchStatus::Terminated => "terminated",
        };
        writer.serialize(BatchMetricsRow {
            batch_number: &outcome.batch.batch_number,
            status: status.to_string(),
            days_simulated: outcome.days_simulated,
            final_stage: outcome.batch.lifecycle_stage.display_name().to_string(),
            events_emitted: outcome.counters.events_emitted,
            transfers_executed: outcome.counters.transfers_executed,
            mortality_total: outcome.counters.mortality_total,
            feed_consumed_kg: outcome.counters.feed_consumed_kg,
            termination_reason: outcome.termination_reason.as_deref().unwrap_or(""),
        })?;
    }
    writer.flush()?;
    Ok(())
}
