use std::sync::Arc;

use anyhow::{Context, Result};
use clinops_loadtest::simulation::{self, SimulationOutcome};
use clinops_warehouse::{Compute, SharedWarehouse, SqlApiWarehouse};

use crate::config::Config;

/// Runs the dashboard simulation on the interactive warehouse and prints the report.
pub async fn simulate(config: Config, save: bool) -> Result<()> {
    let warehouse = SqlApiWarehouse::connect(&config.warehouse, Compute::Interactive)
        .await
        .context("failed to connect to the interactive warehouse")?;
    let warehouse: SharedWarehouse = Arc::new(warehouse);

    let outcome = run(warehouse.clone(), &config, save).await;
    if let Err(err) = warehouse.close().await {
        tracing::warn!(error = &err as &dyn std::error::Error, "failed to close session");
    }

    outcome.map(|_| ())
}

/// Runs the configured simulation against `warehouse`, prints it and optionally saves it.
pub async fn run(
    warehouse: SharedWarehouse,
    config: &Config,
    save: bool,
) -> Result<SimulationOutcome> {
    let settings = &config.simulation;
    let plan = settings.plan(config.warehouse.query_timeout);
    tracing::info!(
        concurrency = plan.concurrency(),
        sessions = plan.sessions(),
        "starting dashboard simulation"
    );

    let outcome = simulation::run(warehouse, plan, settings.policy())
        .await
        .context("dashboard simulation failed")?;
    outcome.print();

    if save {
        let path = outcome
            .save(&settings.output_dir)
            .context("failed to save results")?;
        println!();
        println!("Results saved to {}", path.display());
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clinops_warehouse::InMemoryWarehouse;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn runs_configured_plan() {
        clinops_test::tracing::init();
        let dir = tempfile::tempdir().unwrap();

        let mut config = Config::default();
        config.simulation.concurrency = 2;
        config.simulation.dashboard_iterations = 2;
        config.simulation.operational_iterations = 3;
        config.simulation.operational_delay = Duration::from_millis(10);
        config.simulation.output_dir = dir.path().to_owned();

        let warehouse = clinops_test::fixtures::dashboard_warehouse(4);
        let outcome = run(Arc::new(warehouse), &config, true).await.unwrap();

        assert_eq!(outcome.sessions.len(), 4);
        // three queries per dashboard plus three refreshes of the two operational queries
        assert_eq!(outcome.results.len(), 4 * 3 + 3 * 2);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn empty_patient_sample_fails() {
        let config = Config::default();

        let result = run(Arc::new(InMemoryWarehouse::new()), &config, false).await;
        assert!(result.is_err());
    }
}
