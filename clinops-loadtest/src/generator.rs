//! The load generator: concurrent dashboard sessions and sequential operational refreshes.

use std::sync::Arc;
use std::time::Duration;

use clinops_warehouse::{Param, SharedWarehouse};

use crate::error::{LoadError, LoadResult};
use crate::query::{DashboardQuery, PatientId, SAMPLE_PATIENTS_SQL};
use crate::result::{DashboardLoadResult, QueryResult, ResultLog};
use crate::session::{execute_query, run_session};

/// A builder for creating a [`LoadPlan`].
#[derive(Debug)]
pub struct LoadPlanBuilder {
    concurrency: usize,
    dashboard_iterations: usize,
    operational_iterations: usize,
    operational_delay: Duration,
    query_timeout: Duration,
}

impl LoadPlanBuilder {
    /// Number of dashboard sessions run in parallel within one iteration.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Number of sequential dashboard iterations.
    pub fn dashboard_iterations(mut self, iterations: usize) -> Self {
        self.dashboard_iterations = iterations;
        self
    }

    /// Number of sequential operational refreshes and the pause between them.
    pub fn operational(mut self, iterations: usize, delay: Duration) -> Self {
        self.operational_iterations = iterations;
        self.operational_delay = delay;
        self
    }

    /// Upper bound for a single query execution.
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Creates the plan.
    pub fn build(self) -> LoadPlan {
        LoadPlan {
            concurrency: self.concurrency,
            dashboard_iterations: self.dashboard_iterations,
            operational_iterations: self.operational_iterations,
            operational_delay: self.operational_delay,
            query_timeout: self.query_timeout,
        }
    }
}

/// What the load generator runs.
#[derive(Clone, Debug)]
pub struct LoadPlan {
    /// Dashboard sessions per iteration.
    pub(crate) concurrency: usize,
    /// Sequential dashboard iterations.
    pub(crate) dashboard_iterations: usize,
    /// Sequential operational refreshes.
    pub(crate) operational_iterations: usize,
    /// Pause between operational refreshes.
    pub(crate) operational_delay: Duration,
    /// Upper bound for a single query execution.
    pub(crate) query_timeout: Duration,
}

impl LoadPlan {
    /// Constructs a plan builder with the defaults of the dashboard simulation.
    pub fn builder() -> LoadPlanBuilder {
        LoadPlanBuilder {
            concurrency: 10,
            dashboard_iterations: 5,
            operational_iterations: 10,
            operational_delay: Duration::from_millis(500),
            query_timeout: Duration::from_secs(30),
        }
    }

    /// Dashboard sessions per iteration.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Total number of dashboard sessions.
    pub fn sessions(&self) -> usize {
        self.concurrency * self.dashboard_iterations
    }

    /// Total number of query executions the plan will produce.
    pub fn expected_queries(&self) -> usize {
        self.sessions() * DashboardQuery::PATIENT_DASHBOARD.len()
            + self.operational_iterations * DashboardQuery::OPERATIONAL.len()
    }
}

impl Default for LoadPlan {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Runs a [`LoadPlan`] against a warehouse and collects every execution into a [`ResultLog`].
#[derive(Debug)]
pub struct LoadGenerator {
    warehouse: SharedWarehouse,
    plan: LoadPlan,
    log: ResultLog,
}

impl LoadGenerator {
    /// Creates a generator with an empty result log.
    pub fn new(warehouse: SharedWarehouse, plan: LoadPlan) -> Self {
        Self {
            warehouse,
            plan,
            log: ResultLog::new(),
        }
    }

    /// The plan this generator runs.
    pub fn plan(&self) -> &LoadPlan {
        &self.plan
    }

    /// The shared log of all executions so far.
    pub fn results(&self) -> &ResultLog {
        &self.log
    }

    /// Fetches up to `count` patient ids to open dashboards for.
    pub async fn sample_patient_ids(&self, count: usize) -> LoadResult<Vec<String>> {
        let limit = Param::Fixed(count as i64);
        let rows = self.warehouse.execute(SAMPLE_PATIENTS_SQL, &[limit]).await?;
        let ids = rows.decode::<PatientId>()?;
        tracing::debug!(requested = count, received = ids.len(), "sampled patients");
        Ok(ids.into_iter().map(|PatientId(id)| id).collect())
    }

    /// Samples patients from the warehouse and runs the dashboard phase for them.
    ///
    /// A plan without dashboard sessions skips sampling and yields no sessions.
    pub async fn run_dashboards(&self) -> LoadResult<Vec<DashboardLoadResult>> {
        if self.plan.sessions() == 0 {
            return Ok(Vec::new());
        }

        let patient_ids = self.sample_patient_ids(self.plan.sessions()).await?;
        self.run_dashboards_for(&patient_ids).await
    }

    /// Runs the dashboard phase for the given patients.
    ///
    /// Every iteration opens exactly `concurrency` dashboards in parallel and waits for all of
    /// them before the next iteration starts. Patients are assigned round-robin, so fewer patients
    /// than sessions are reused.
    pub async fn run_dashboards_for(
        &self,
        patient_ids: &[String],
    ) -> LoadResult<Vec<DashboardLoadResult>> {
        if self.plan.sessions() == 0 {
            return Ok(Vec::new());
        }
        if patient_ids.is_empty() {
            return Err(LoadError::NoPatients);
        }

        let iterations = self.plan.dashboard_iterations;
        let mut subjects = patient_ids.iter().cycle();
        let mut sessions = Vec::with_capacity(self.plan.sessions());

        for iteration in 0..iterations {
            tracing::info!(
                iteration = iteration + 1,
                iterations,
                concurrency = self.plan.concurrency,
                "dashboard iteration"
            );

            let tasks: Vec<_> = subjects
                .by_ref()
                .take(self.plan.concurrency)
                .map(|patient_id| {
                    let warehouse = Arc::clone(&self.warehouse);
                    let log = self.log.clone();
                    let patient_id = patient_id.clone();
                    let timeout = self.plan.query_timeout;
                    tokio::spawn(async move {
                        let session = run_session(warehouse.as_ref(), patient_id, timeout).await;
                        log.extend(session.query_results.iter().cloned());
                        session
                    })
                })
                .collect();

            for task in futures::future::join_all(tasks).await {
                match task {
                    Ok(session) => sessions.push(session),
                    Err(err) => {
                        tracing::error!(error = &err as &dyn std::error::Error, "session aborted")
                    }
                }
            }
        }

        Ok(sessions)
    }

    /// Runs the operational phase: each iteration refreshes the operational queries in order.
    pub async fn run_operational(&self) -> Vec<QueryResult> {
        let iterations = self.plan.operational_iterations;
        let mut results = Vec::with_capacity(iterations * DashboardQuery::OPERATIONAL.len());

        for iteration in 0..iterations {
            tracing::info!(iteration = iteration + 1, iterations, "operational iteration");

            for query in DashboardQuery::OPERATIONAL {
                let (result, rows) = execute_query(
                    self.warehouse.as_ref(),
                    query,
                    &[],
                    self.plan.query_timeout,
                )
                .await;
                if query == DashboardQuery::HighRiskAlerts && !rows.is_empty() {
                    tracing::debug!(alerts = rows.len(), "critical lab results in the last day");
                }
                self.log.push(result.clone());
                results.push(result);
            }

            if iteration + 1 < iterations && !self.plan.operational_delay.is_zero() {
                tokio::time::sleep(self.plan.operational_delay).await;
            }
        }

        results
    }
}
