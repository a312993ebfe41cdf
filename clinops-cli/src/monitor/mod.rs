//! Read-only monitors over warehouse usage and pipeline metadata.
//!
//! A monitor query that fails is logged and its section reported empty, so one unavailable view
//! never hides the others.

use clinops_warehouse::{FromRow, Param, Warehouse};

pub mod cdc;
pub mod cost;

/// Executes a monitor query and decodes its rows, returning no rows on failure.
async fn collect<T: FromRow>(
    warehouse: &dyn Warehouse,
    section: &'static str,
    sql: &str,
    params: &[Param],
) -> Vec<T> {
    let decoded = warehouse
        .execute(sql, params)
        .await
        .and_then(|rows| rows.decode::<T>());

    match decoded {
        Ok(rows) => {
            tracing::debug!(section, rows = rows.len(), "monitor query finished");
            rows
        }
        Err(err) => {
            tracing::error!(
                error = &err as &dyn std::error::Error,
                section,
                "monitor query failed"
            );
            Vec::new()
        }
    }
}
