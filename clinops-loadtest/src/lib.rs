//! Dashboard load simulation against the clinical data warehouse.
//!
//! The [`LoadGenerator`] opens patient dashboards concurrently, `concurrency` sessions per
//! iteration with a barrier between iterations, and then refreshes the operational dashboard a
//! fixed number of times. Every query execution is measured into a [`QueryResult`]; failures are
//! recorded, never propagated.
//!
//! Once a run completes, [`LatencyReport`] computes nearest-rank percentiles and SLA verdicts over
//! all results, and [`export`] writes them to CSV.
//!
//! ```no_run
//! # async fn demo(warehouse: clinops_warehouse::SharedWarehouse) -> clinops_loadtest::LoadResult<()> {
//! use clinops_loadtest::{LoadPlan, SlaPolicy};
//!
//! let plan = LoadPlan::builder().concurrency(10).dashboard_iterations(5).build();
//! let outcome = clinops_loadtest::simulation::run(warehouse, plan, SlaPolicy::default()).await?;
//! outcome.print();
//! # Ok(())
//! # }
//! ```
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

mod error;
pub mod export;
mod generator;
mod query;
pub mod report;
mod result;
mod session;
pub mod simulation;

pub use error::{LoadError, LoadResult};
pub use generator::{LoadGenerator, LoadPlan, LoadPlanBuilder};
pub use query::{
    DashboardQuery, DashboardRow, EdCensusHour, HighRiskAlert, PatientId, PatientSummary,
    RecentEncounter, RecentLab, SAMPLE_PATIENTS_SQL,
};
pub use report::{LatencyReport, LatencyStats, LatencySummary, SlaPolicy};
pub use result::{DashboardLoadResult, Outcome, QueryResult, ResultLog};
pub use session::{execute_query, run_session};
