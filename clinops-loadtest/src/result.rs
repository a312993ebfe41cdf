//! Records produced by the load generator.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::query::DashboardQuery;

/// Rounds milliseconds to two decimals, the precision used in reports and result files.
fn round_ms(ms: f64) -> f64 {
    (ms * 100.0).round() / 100.0
}

/// Whether a query execution succeeded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The statement completed and its rows decoded.
    Success {
        /// The warehouse statement handle, if reported.
        query_id: Option<String>,
    },
    /// The statement failed, timed out, or returned rows that did not decode.
    Failure {
        /// Human readable error message.
        error: String,
    },
}

/// The measurement of one query execution.
///
/// Created exactly once per execution and never modified afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryResult {
    query: DashboardQuery,
    execution_time_ms: f64,
    row_count: u64,
    timestamp: DateTime<Utc>,
    outcome: Outcome,
}

impl QueryResult {
    /// Records a successful execution.
    pub fn succeeded(
        query: DashboardQuery,
        elapsed: Duration,
        row_count: u64,
        query_id: Option<String>,
    ) -> Self {
        Self {
            query,
            execution_time_ms: round_ms(elapsed.as_secs_f64() * 1000.0),
            row_count,
            timestamp: Utc::now(),
            outcome: Outcome::Success { query_id },
        }
    }

    /// Records a failed execution. The time spent on the attempt is kept.
    pub fn failed(query: DashboardQuery, elapsed: Duration, error: impl Into<String>) -> Self {
        Self {
            query,
            execution_time_ms: round_ms(elapsed.as_secs_f64() * 1000.0),
            row_count: 0,
            timestamp: Utc::now(),
            outcome: Outcome::Failure {
                error: error.into(),
            },
        }
    }

    /// The query that was executed.
    pub fn query(&self) -> DashboardQuery {
        self.query
    }

    /// The name of the query that was executed.
    pub fn query_name(&self) -> &'static str {
        self.query.name()
    }

    /// Wall-clock time from submission to decoded rows, in milliseconds.
    pub fn execution_time_ms(&self) -> f64 {
        self.execution_time_ms
    }

    /// Number of rows returned; zero on failure.
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// When the execution finished.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The outcome of the execution.
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    /// Returns `true` if the execution succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success { .. })
    }

    /// The error message of a failed execution.
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Success { .. } => None,
            Outcome::Failure { error } => Some(error),
        }
    }

    /// The warehouse statement handle of a successful execution.
    pub fn query_id(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Success { query_id } => query_id.as_deref(),
            Outcome::Failure { .. } => None,
        }
    }
}

/// One simulated dashboard open for a single patient.
#[derive(Clone, Debug, PartialEq)]
pub struct DashboardLoadResult {
    /// The patient the dashboard was opened for.
    pub patient_id: String,
    /// Sum of the execution times of all constituent queries, failed attempts included.
    pub total_load_time_ms: f64,
    /// The constituent queries, in execution order.
    pub query_results: Vec<QueryResult>,
    /// Set when any constituent query failed.
    pub degraded: bool,
}

impl DashboardLoadResult {
    /// Assembles a session from its complete set of query results.
    pub fn new(patient_id: String, query_results: Vec<QueryResult>) -> Self {
        let total = query_results.iter().map(|r| r.execution_time_ms).sum();
        let degraded = query_results.iter().any(|r| !r.is_success());
        Self {
            patient_id,
            total_load_time_ms: round_ms(total),
            query_results,
            degraded,
        }
    }
}

/// The shared collection all executions are appended to.
///
/// Cloning yields another handle to the same collection; appends from concurrent tasks are
/// serialized by a mutex.
#[derive(Clone, Debug, Default)]
pub struct ResultLog(Arc<Mutex<Vec<QueryResult>>>);

impl ResultLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one result.
    pub fn push(&self, result: QueryResult) {
        self.0.lock().unwrap().push(result);
    }

    /// Appends several results at once, keeping them adjacent.
    pub fn extend(&self, results: impl IntoIterator<Item = QueryResult>) {
        self.0.lock().unwrap().extend(results);
    }

    /// Number of results recorded so far.
    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy of all results recorded so far.
    pub fn snapshot(&self) -> Vec<QueryResult> {
        self.0.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_keeps_duration() {
        let result = QueryResult::failed(
            DashboardQuery::RecentLabs,
            Duration::from_micros(12_340),
            "boom",
        );

        assert!(!result.is_success());
        assert_eq!(result.error(), Some("boom"));
        assert_eq!(result.query_id(), None);
        assert_eq!(result.execution_time_ms(), 12.34);
        assert_eq!(result.row_count(), 0);
    }

    #[test]
    fn session_sums_all_attempts() {
        let results = vec![
            QueryResult::succeeded(
                DashboardQuery::PatientSummary,
                Duration::from_millis(10),
                1,
                Some("q1".into()),
            ),
            QueryResult::failed(
                DashboardQuery::RecentEncounters,
                Duration::from_millis(25),
                "timeout",
            ),
            QueryResult::succeeded(DashboardQuery::RecentLabs, Duration::from_millis(5), 4, None),
        ];

        let session = DashboardLoadResult::new("PAT-1".into(), results);
        assert_eq!(session.total_load_time_ms, 40.0);
        assert!(session.degraded);
        assert_eq!(session.query_results.len(), 3);
    }

    #[tokio::test]
    async fn log_accepts_concurrent_appends() {
        let log = ResultLog::new();
        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let log = log.clone();
                tokio::spawn(async move {
                    for _ in 0..10 {
                        log.push(QueryResult::succeeded(
                            DashboardQuery::EdCensus,
                            Duration::ZERO,
                            0,
                            None,
                        ));
                    }
                })
            })
            .collect();
        for task in futures::future::join_all(tasks).await {
            task.unwrap();
        }

        assert_eq!(log.len(), 320);
    }
}
