//! Runs the full dashboard simulation: dashboards, then operational refreshes, then the report.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clinops_warehouse::SharedWarehouse;
use indicatif::ProgressBar;
use yansi::Paint;

use crate::error::LoadResult;
use crate::export::save_results;
use crate::generator::{LoadGenerator, LoadPlan};
use crate::report::{LatencyReport, SlaPolicy};
use crate::result::{DashboardLoadResult, QueryResult};

/// Everything a simulation run produced.
#[derive(Debug)]
pub struct SimulationOutcome {
    /// All dashboard sessions, in completion order per iteration.
    pub sessions: Vec<DashboardLoadResult>,
    /// Every query execution of the run.
    pub results: Vec<QueryResult>,
    /// Statistics over `results`.
    pub report: LatencyReport,
}

impl SimulationOutcome {
    /// Number of sessions with at least one failed query.
    pub fn degraded_sessions(&self) -> usize {
        self.sessions.iter().filter(|s| s.degraded).count()
    }

    /// Prints the report and a session summary to stdout.
    pub fn print(&self) {
        self.report.print();

        let degraded = self.degraded_sessions();
        println!();
        print!("{} dashboard sessions", self.sessions.len().bold());
        if degraded > 0 {
            print!(", {}", format!("{degraded} DEGRADED").bold().red());
        }
        println!();
    }

    /// Saves all executions as CSV in `dir`.
    pub fn save(&self, dir: &Path) -> LoadResult<PathBuf> {
        save_results(dir, &self.results)
    }
}

/// Runs `plan` against `warehouse` and builds the report.
///
/// Fails only when no dashboard can be opened at all; individual query failures end up in the
/// report.
pub async fn run(
    warehouse: SharedWarehouse,
    plan: LoadPlan,
    policy: SlaPolicy,
) -> LoadResult<SimulationOutcome> {
    let generator = LoadGenerator::new(warehouse, plan);

    let bar = ProgressBar::new_spinner().with_message(format!(
        "Opening {} dashboards ({} at a time)",
        generator.plan().sessions(),
        generator.plan().concurrency()
    ));
    bar.enable_steady_tick(Duration::from_millis(100));

    let sessions = match generator.run_dashboards().await {
        Ok(sessions) => sessions,
        Err(err) => {
            bar.finish_and_clear();
            return Err(err);
        }
    };

    bar.set_message("Refreshing operational dashboard");
    generator.run_operational().await;
    bar.finish_and_clear();

    let results = generator.results().snapshot();
    tracing::info!(
        sessions = sessions.len(),
        executions = results.len(),
        "simulation finished"
    );

    let report = LatencyReport::build(&results, policy);
    Ok(SimulationOutcome {
        sessions,
        results,
        report,
    })
}
