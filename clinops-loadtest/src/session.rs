//! Single query executions and dashboard sessions.

use std::time::Duration;

use clinops_warehouse::{Param, Warehouse, WarehouseError};
use tokio::time::Instant;

use crate::query::{DashboardQuery, DashboardRow};
use crate::result::{DashboardLoadResult, QueryResult};

/// Executes one dashboard query and measures it.
///
/// The duration covers submission, the warehouse round trip and decoding of the rows. Failures
/// never propagate: a warehouse error, an elapsed `timeout` or undecodable rows all produce a
/// failed [`QueryResult`] carrying the error message and the time spent on the attempt.
pub async fn execute_query(
    warehouse: &dyn Warehouse,
    query: DashboardQuery,
    params: &[Param],
    timeout: Duration,
) -> (QueryResult, Vec<DashboardRow>) {
    let start = Instant::now();

    let outcome = match tokio::time::timeout(timeout, warehouse.execute(query.sql(), params)).await
    {
        Ok(Ok(result_set)) => query.decode(&result_set).map(|rows| {
            let query_id = result_set.statement_handle().map(str::to_owned);
            (query_id, rows)
        }),
        Ok(Err(err)) => Err(err),
        Err(_elapsed) => Err(WarehouseError::Timeout(timeout)),
    };
    let elapsed = start.elapsed();

    match outcome {
        Ok((query_id, rows)) => {
            tracing::trace!(query = query.name(), ?elapsed, rows = rows.len(), "query done");
            let result = QueryResult::succeeded(query, elapsed, rows.len() as u64, query_id);
            (result, rows)
        }
        Err(err) => {
            tracing::warn!(
                query = query.name(),
                error = &err as &dyn std::error::Error,
                "query failed"
            );
            (QueryResult::failed(query, elapsed, err.to_string()), Vec::new())
        }
    }
}

/// Opens one patient dashboard: the patient-scoped queries, one after another.
pub async fn run_session(
    warehouse: &dyn Warehouse,
    patient_id: String,
    timeout: Duration,
) -> DashboardLoadResult {
    let params = [Param::from(patient_id.as_str())];

    let mut results = Vec::with_capacity(DashboardQuery::PATIENT_DASHBOARD.len());
    for query in DashboardQuery::PATIENT_DASHBOARD {
        let (result, _rows) = execute_query(warehouse, query, &params, timeout).await;
        results.push(result);
    }

    DashboardLoadResult::new(patient_id, results)
}

#[cfg(test)]
mod tests {
    use clinops_warehouse::{InMemoryWarehouse, ResultSet};

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn census() -> ResultSet {
        ResultSet::from_strings(
            &["HOUR", "ED_VISITS", "UNIQUE_PATIENTS"],
            [
                [Some("2024-05-01 13:00:00"), Some("4"), Some("4")],
                [Some("2024-05-01 12:00:00"), Some("2"), Some("1")],
            ],
        )
    }

    #[tokio::test(start_paused = true)]
    async fn measures_successful_query() {
        let warehouse =
            InMemoryWarehouse::new().respond_after("ED_VISITS", census(), Duration::from_millis(42));

        let (result, rows) =
            execute_query(&warehouse, DashboardQuery::EdCensus, &[], TIMEOUT).await;

        assert!(result.is_success());
        assert_eq!(result.row_count(), 2);
        assert_eq!(rows.len(), 2);
        assert_eq!(result.execution_time_ms(), 42.0);
        assert!(result.query_id().is_some());
    }

    #[tokio::test]
    async fn captures_warehouse_errors() {
        let warehouse = InMemoryWarehouse::new().fail("ED_VISITS", "warehouse suspended");

        let (result, rows) =
            execute_query(&warehouse, DashboardQuery::EdCensus, &[], TIMEOUT).await;

        assert!(!result.is_success());
        assert!(result.error().unwrap().contains("warehouse suspended"));
        assert!(rows.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn captures_timeouts_with_duration() {
        let warehouse =
            InMemoryWarehouse::new().respond_after("ED_VISITS", census(), Duration::from_secs(60));

        let (result, _) = execute_query(
            &warehouse,
            DashboardQuery::EdCensus,
            &[],
            Duration::from_millis(250),
        )
        .await;

        assert!(!result.is_success());
        assert!(result.error().unwrap().contains("timed out"));
        assert_eq!(result.execution_time_ms(), 250.0);
    }

    #[tokio::test]
    async fn undecodable_rows_fail_the_query() {
        let garbage = ResultSet::from_strings(&["HOUR"], [[Some("not a time")]]);
        let warehouse = InMemoryWarehouse::new().respond("ED_VISITS", garbage);

        let (result, _) = execute_query(&warehouse, DashboardQuery::EdCensus, &[], TIMEOUT).await;

        assert!(!result.is_success());
        assert!(result.error().unwrap().contains("cannot decode"));
    }

    #[tokio::test]
    async fn session_runs_patient_queries_in_order() {
        let warehouse = InMemoryWarehouse::new().fail("LAB_RESULTS", "permission denied");

        let session = run_session(&warehouse, "PAT-0001".into(), TIMEOUT).await;

        let names: Vec<_> = session.query_results.iter().map(|r| r.query_name()).collect();
        assert_eq!(names, ["patient_summary", "recent_encounters", "recent_labs"]);
        assert!(session.degraded);

        let executed = warehouse.executed();
        assert_eq!(executed.len(), 3);
        assert!(executed.iter().all(|e| e.params == [Param::from("PAT-0001")]));
    }
}
