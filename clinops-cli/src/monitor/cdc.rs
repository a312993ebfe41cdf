//! Health of the CDC pipeline: change streams on the raw tables and the Dynamic Tables built on
//! top of them.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clinops_warehouse::{
    Compute, FromRow, Param, Row, SqlApiWarehouse, Warehouse, WarehouseResult,
};
use yansi::Paint;

use super::collect;
use crate::config::Config;

/// Schema holding the Dynamic Tables.
pub const STAGING_SCHEMA: &str = "STAGING";

const STREAMS_SQL: &str = "\
SELECT
    STREAM_NAME,
    TABLE_NAME,
    STALE,
    SYSTEM$STREAM_HAS_DATA(STREAM_NAME) AS HAS_DATA
FROM INFORMATION_SCHEMA.STREAMS
WHERE SCHEMA_NAME = ?
ORDER BY STREAM_NAME";

const DYNAMIC_TABLES_SQL: &str = "\
SELECT
    NAME,
    TARGET_LAG,
    REFRESH_MODE,
    LAST_REFRESH_TIME,
    DATEDIFF(MINUTE, LAST_REFRESH_TIME, CURRENT_TIMESTAMP()) AS MINUTES_SINCE_REFRESH
FROM INFORMATION_SCHEMA.DYNAMIC_TABLES
WHERE SCHEMA_NAME = ?
ORDER BY NAME";

/// State of one change stream.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamStatus {
    /// Stream name.
    pub stream_name: String,
    /// The table the stream tracks.
    pub table_name: String,
    /// The stream's offset fell out of the table's retention and it must be recreated.
    pub stale: bool,
    /// The stream holds unconsumed changes.
    pub has_data: bool,
    /// Number of unconsumed changes, counted only for streams with data.
    pub pending_changes: Option<u64>,
}

impl FromRow for StreamStatus {
    fn from_row(row: &Row) -> WarehouseResult<Self> {
        Ok(Self {
            stream_name: row.text(0)?.to_owned(),
            table_name: row.text(1)?.to_owned(),
            stale: row.flag(2)?,
            has_data: row.flag(3)?,
            pending_changes: None,
        })
    }
}

/// Refresh state of one Dynamic Table.
#[derive(Clone, Debug, PartialEq)]
pub struct DynamicTableStatus {
    /// Table name.
    pub name: String,
    /// Configured freshness target, e.g. `1 minute`.
    pub target_lag: String,
    /// `INCREMENTAL` or `FULL`.
    pub refresh_mode: String,
    /// End of the last refresh, if the table was ever refreshed.
    pub last_refresh: Option<NaiveDateTime>,
    /// Minutes since the last refresh.
    pub minutes_since_refresh: Option<i64>,
}

impl FromRow for DynamicTableStatus {
    fn from_row(row: &Row) -> WarehouseResult<Self> {
        Ok(Self {
            name: row.text(0)?.to_owned(),
            target_lag: row.text(1)?.to_owned(),
            refresh_mode: row.text(2)?.to_owned(),
            last_refresh: row.timestamp_opt(3)?,
            minutes_since_refresh: row.get_opt(4)?,
        })
    }
}

struct Count(u64);

impl FromRow for Count {
    fn from_row(row: &Row) -> WarehouseResult<Self> {
        row.get(0).map(Count)
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Returns the change streams in `schema`, ordered by name.
pub async fn stream_status(warehouse: &dyn Warehouse, schema: &str) -> Vec<StreamStatus> {
    let params = [Param::from(schema)];
    let streams: Vec<StreamStatus> = collect(warehouse, "streams", STREAMS_SQL, &params).await;

    tracing::info!(count = streams.len(), "checked cdc streams");
    streams
}

/// Counts the unconsumed changes of a stream without consuming them.
pub async fn pending_changes(warehouse: &dyn Warehouse, schema: &str, stream: &str) -> Option<u64> {
    let sql = format!(
        "SELECT COUNT(*) FROM {}.{}",
        quote_identifier(schema),
        quote_identifier(stream)
    );
    let counts: Vec<Count> = collect(warehouse, "pending changes", &sql, &[]).await;
    let count = counts.first().map(|count| count.0);

    if let Some(count) = count {
        tracing::info!(stream, count, "pending changes");
    }
    count
}

/// Returns the Dynamic Tables in `schema`, ordered by name.
pub async fn dynamic_tables(warehouse: &dyn Warehouse, schema: &str) -> Vec<DynamicTableStatus> {
    let params = [Param::from(schema)];
    let tables: Vec<DynamicTableStatus> =
        collect(warehouse, "dynamic tables", DYNAMIC_TABLES_SQL, &params).await;

    tracing::info!(count = tables.len(), "monitored dynamic tables");
    tables
}

/// Everything the CDC monitor reports.
#[derive(Debug, Default)]
pub struct CdcReport {
    /// Change streams on the raw tables.
    pub streams: Vec<StreamStatus>,
    /// Dynamic Tables in the staging schema.
    pub tables: Vec<DynamicTableStatus>,
}

impl CdcReport {
    /// Queries stream and Dynamic Table status.
    ///
    /// Pending changes are counted for every stream that reports data.
    pub async fn collect(warehouse: &dyn Warehouse, stream_schema: &str) -> Self {
        let mut streams = stream_status(warehouse, stream_schema).await;
        for stream in streams.iter_mut().filter(|s| s.has_data) {
            stream.pending_changes =
                pending_changes(warehouse, stream_schema, &stream.stream_name).await;
        }

        Self {
            streams,
            tables: dynamic_tables(warehouse, STAGING_SCHEMA).await,
        }
    }

    /// Prints the report to stdout.
    pub fn print(&self) {
        println!();
        println!("{}", "## CDC STREAMS".bold());
        if self.streams.is_empty() {
            println!("  {}", "no streams".dim());
        }
        for stream in &self.streams {
            print!("  {} ({}): ", stream.stream_name, stream.table_name);
            match (stream.has_data, stream.pending_changes) {
                (true, Some(count)) => print!("{}", format!("{count} pending changes").green()),
                (true, None) => print!("{}", "has data".green()),
                (false, _) => print!("{}", "no data".dim()),
            }
            if stream.stale {
                print!(", {}", "STALE".bold().red());
            }
            println!();
        }

        println!();
        println!("{}", "## DYNAMIC TABLES".bold());
        if self.tables.is_empty() {
            println!("  {}", "no dynamic tables".dim());
        }
        for table in &self.tables {
            let refreshed = match table.minutes_since_refresh {
                Some(minutes) => format!("last refresh {minutes} min ago"),
                None => "never refreshed".to_owned(),
            };
            println!(
                "  {}: {} (target lag {}, {})",
                table.name.bold(),
                refreshed,
                table.target_lag,
                table.refresh_mode.to_lowercase()
            );
        }
    }
}

/// Connects to the CDC warehouse and prints the pipeline status.
pub async fn cdc(config: Config) -> Result<()> {
    let warehouse = SqlApiWarehouse::connect(&config.warehouse, Compute::Cdc)
        .await
        .context("failed to connect to the warehouse")?;

    let report = CdcReport::collect(&warehouse, &config.warehouse.schema).await;
    if let Err(err) = warehouse.close().await {
        tracing::warn!(error = &err as &dyn std::error::Error, "failed to close session");
    }

    report.print();
    Ok(())
}

#[cfg(test)]
mod tests {
    use clinops_warehouse::{InMemoryWarehouse, ResultSet};

    use super::*;

    fn streams() -> ResultSet {
        ResultSet::from_strings(
            &["STREAM_NAME", "TABLE_NAME", "STALE", "HAS_DATA"],
            [
                [Some("ENCOUNTERS_STREAM"), Some("ENCOUNTERS_CDC"), Some("false"), Some("true")],
                [Some("PATIENTS_STREAM"), Some("PATIENTS_CDC"), Some("true"), Some("false")],
            ],
        )
    }

    #[tokio::test]
    async fn decodes_streams() {
        let warehouse = InMemoryWarehouse::new().respond("INFORMATION_SCHEMA.STREAMS", streams());

        let streams = stream_status(&warehouse, "RAW_DATA").await;
        assert_eq!(streams.len(), 2);
        assert!(streams[0].has_data);
        assert!(!streams[0].stale);
        assert!(streams[1].stale);
        assert_eq!(
            warehouse.executed()[0].params,
            vec![Param::from("RAW_DATA")]
        );
    }

    #[tokio::test]
    async fn counts_pending_changes_of_streams_with_data() {
        let warehouse = InMemoryWarehouse::new()
            .respond("INFORMATION_SCHEMA.STREAMS", streams())
            .respond(
                "SELECT COUNT(*)",
                ResultSet::from_strings(&["COUNT(*)"], [[Some("42")]]),
            );

        let report = CdcReport::collect(&warehouse, "RAW_DATA").await;
        assert_eq!(report.streams[0].pending_changes, Some(42));
        assert_eq!(report.streams[1].pending_changes, None);

        let executed = warehouse.executed();
        assert_eq!(executed.len(), 3);
        assert_eq!(
            executed[1].sql,
            r#"SELECT COUNT(*) FROM "RAW_DATA"."ENCOUNTERS_STREAM""#
        );
        assert_eq!(executed[2].params, vec![Param::from(STAGING_SCHEMA)]);
    }

    #[tokio::test]
    async fn decodes_dynamic_tables() {
        let warehouse = InMemoryWarehouse::new().respond(
            "INFORMATION_SCHEMA.DYNAMIC_TABLES",
            ResultSet::from_strings(
                &["NAME", "TARGET_LAG", "REFRESH_MODE", "LAST_REFRESH_TIME", "MINUTES_SINCE_REFRESH"],
                [
                    [
                        Some("PATIENTS"),
                        Some("1 minute"),
                        Some("INCREMENTAL"),
                        Some("1714600000.000000000"),
                        Some("3"),
                    ],
                    [Some("LABS"), Some("DOWNSTREAM"), Some("FULL"), None, None],
                ],
            ),
        );

        let tables = dynamic_tables(&warehouse, STAGING_SCHEMA).await;
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].minutes_since_refresh, Some(3));
        assert!(tables[0].last_refresh.is_some());
        assert_eq!(tables[1].last_refresh, None);
        assert_eq!(tables[1].refresh_mode, "FULL");
    }

    #[tokio::test]
    async fn failures_leave_sections_empty() {
        clinops_test::tracing::init();
        let warehouse = InMemoryWarehouse::new()
            .fail("INFORMATION_SCHEMA", "schema does not exist");

        let report = CdcReport::collect(&warehouse, "RAW_DATA").await;
        assert!(report.streams.is_empty());
        assert!(report.tables.is_empty());
    }

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_identifier("A\"B"), "\"A\"\"B\"");
    }
}
