//! Compute cost of the clinical warehouses, from the account's metering history.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clinops_warehouse::{
    Compute, FromRow, Param, Row, SqlApiWarehouse, Warehouse, WarehouseResult,
};
use yansi::Paint;

use super::collect;
use crate::config::Config;

/// Estimated price of one credit, in US dollars.
pub const CREDIT_PRICE_USD: f64 = 3.0;

/// Number of per-warehouse days printed by [`CostReport::print`].
const PRINTED_COST_DAYS: usize = 5;

const DAILY_SUMMARY_SQL: &str = "\
SELECT
    CURRENT_DATE() AS DATE,
    SUM(CREDITS_USED) AS TOTAL_CREDITS,
    SUM(CREDITS_USED) * ? AS TOTAL_COST_USD,
    COUNT(DISTINCT WAREHOUSE_NAME) AS WAREHOUSES_USED,
    COUNT(*) AS TOTAL_QUERIES
FROM SNOWFLAKE.ACCOUNT_USAGE.WAREHOUSE_METERING_HISTORY
WHERE DATE(START_TIME) = CURRENT_DATE()
  AND WAREHOUSE_NAME LIKE 'CLINICAL%'";

const WAREHOUSE_COSTS_SQL: &str = "\
SELECT
    WAREHOUSE_NAME,
    DATE(START_TIME) AS DATE,
    SUM(CREDITS_USED) AS TOTAL_CREDITS,
    SUM(CREDITS_USED) * ? AS ESTIMATED_COST_USD,
    COUNT(*) AS QUERY_COUNT
FROM SNOWFLAKE.ACCOUNT_USAGE.WAREHOUSE_METERING_HISTORY
WHERE START_TIME >= DATEADD(DAY, -?, CURRENT_TIMESTAMP())
  AND WAREHOUSE_NAME IN (?, ?, ?)
GROUP BY WAREHOUSE_NAME, DATE(START_TIME)
ORDER BY DATE DESC, WAREHOUSE_NAME";

const ANOMALIES_SQL: &str = "\
WITH DAILY_COSTS AS (
    SELECT
        DATE(START_TIME) AS DATE,
        WAREHOUSE_NAME,
        SUM(CREDITS_USED) AS CREDITS
    FROM SNOWFLAKE.ACCOUNT_USAGE.WAREHOUSE_METERING_HISTORY
    WHERE START_TIME >= DATEADD(DAY, -30, CURRENT_TIMESTAMP())
    GROUP BY DATE(START_TIME), WAREHOUSE_NAME
),
AVERAGES AS (
    SELECT
        WAREHOUSE_NAME,
        AVG(CREDITS) AS AVG_CREDITS,
        STDDEV(CREDITS) AS STDDEV_CREDITS
    FROM DAILY_COSTS
    GROUP BY WAREHOUSE_NAME
)
SELECT
    DC.DATE,
    DC.WAREHOUSE_NAME,
    DC.CREDITS,
    A.AVG_CREDITS,
    (DC.CREDITS - A.AVG_CREDITS) / NULLIF(A.STDDEV_CREDITS, 0) AS Z_SCORE
FROM DAILY_COSTS DC
JOIN AVERAGES A ON DC.WAREHOUSE_NAME = A.WAREHOUSE_NAME
WHERE DC.CREDITS > A.AVG_CREDITS * ?
ORDER BY DC.DATE DESC";

/// Today's usage across all clinical warehouses.
#[derive(Clone, Debug, PartialEq)]
pub struct DailySummary {
    /// The warehouse's current date.
    pub date: NaiveDate,
    /// Credits consumed today.
    pub total_credits: f64,
    /// Estimated cost of those credits.
    pub total_cost_usd: f64,
    /// Number of distinct warehouses that ran.
    pub warehouses_used: u64,
    /// Number of metering records.
    pub total_queries: u64,
}

impl FromRow for DailySummary {
    fn from_row(row: &Row) -> WarehouseResult<Self> {
        // aggregates over no metering rows come back as NULL
        Ok(Self {
            date: row.date(0)?,
            total_credits: row.get_opt(1)?.unwrap_or(0.0),
            total_cost_usd: row.get_opt(2)?.unwrap_or(0.0),
            warehouses_used: row.get_opt(3)?.unwrap_or(0),
            total_queries: row.get_opt(4)?.unwrap_or(0),
        })
    }
}

/// Usage of one warehouse on one day.
#[derive(Clone, Debug, PartialEq)]
pub struct WarehouseCost {
    /// Warehouse name.
    pub warehouse: String,
    /// Metering day.
    pub date: NaiveDate,
    /// Credits consumed.
    pub credits: f64,
    /// Estimated cost of those credits.
    pub cost_usd: f64,
    /// Number of metering records.
    pub queries: u64,
}

impl FromRow for WarehouseCost {
    fn from_row(row: &Row) -> WarehouseResult<Self> {
        Ok(Self {
            warehouse: row.text(0)?.to_owned(),
            date: row.date(1)?,
            credits: row.get(2)?,
            cost_usd: row.get(3)?,
            queries: row.get(4)?,
        })
    }
}

/// A warehouse day with unusually high usage.
#[derive(Clone, Debug, PartialEq)]
pub struct CostAnomaly {
    /// Metering day.
    pub date: NaiveDate,
    /// Warehouse name.
    pub warehouse: String,
    /// Credits consumed that day.
    pub credits: f64,
    /// Average daily credits of the warehouse over the last 30 days.
    pub avg_credits: f64,
    /// Standard score of the day, `0` when the warehouse has no variance.
    pub z_score: f64,
}

impl FromRow for CostAnomaly {
    fn from_row(row: &Row) -> WarehouseResult<Self> {
        Ok(Self {
            date: row.date(0)?,
            warehouse: row.text(1)?.to_owned(),
            credits: row.get(2)?,
            avg_credits: row.get(3)?,
            z_score: row.get_opt(4)?.unwrap_or(0.0),
        })
    }
}

/// Returns today's usage, or `None` if it could not be queried.
pub async fn daily_summary(warehouse: &dyn Warehouse) -> Option<DailySummary> {
    let params = [Param::Real(CREDIT_PRICE_USD)];
    let rows: Vec<DailySummary> =
        collect(warehouse, "daily summary", DAILY_SUMMARY_SQL, &params).await;
    let summary = rows.into_iter().next();

    if let Some(ref summary) = summary {
        tracing::info!(cost_usd = summary.total_cost_usd, "today's cost");
    }
    summary
}

/// Returns per-warehouse daily usage of the last `days` days, newest first.
pub async fn warehouse_costs(
    warehouse: &dyn Warehouse,
    names: [&str; 3],
    days: u32,
) -> Vec<WarehouseCost> {
    let params = [
        Param::Real(CREDIT_PRICE_USD),
        Param::Fixed(days.into()),
        names[0].into(),
        names[1].into(),
        names[2].into(),
    ];
    let costs: Vec<WarehouseCost> =
        collect(warehouse, "warehouse costs", WAREHOUSE_COSTS_SQL, &params).await;

    tracing::info!(rows = costs.len(), "retrieved warehouse costs");
    costs
}

/// Returns the warehouse days of the last 30 days whose credits exceed `multiplier` times the
/// warehouse's average, newest first.
pub async fn detect_anomalies(warehouse: &dyn Warehouse, multiplier: f64) -> Vec<CostAnomaly> {
    let params = [Param::Real(multiplier)];
    let anomalies: Vec<CostAnomaly> =
        collect(warehouse, "cost anomalies", ANOMALIES_SQL, &params).await;

    if !anomalies.is_empty() {
        tracing::warn!(count = anomalies.len(), "found cost anomalies");
    }
    anomalies
}

/// Everything the cost monitor reports.
#[derive(Debug, Default)]
pub struct CostReport {
    /// Today's usage, if available.
    pub summary: Option<DailySummary>,
    /// Per-warehouse usage, newest first.
    pub costs: Vec<WarehouseCost>,
    /// Days of unusually high usage.
    pub anomalies: Vec<CostAnomaly>,
    /// Number of days covered by `costs`.
    pub days: u32,
}

impl CostReport {
    /// Queries all cost sections.
    pub async fn collect(warehouse: &dyn Warehouse, config: &Config) -> Self {
        let names = &config.warehouse.warehouses;
        let days = config.cost.days;

        Self {
            summary: daily_summary(warehouse).await,
            costs: warehouse_costs(
                warehouse,
                [names.init.as_str(), names.cdc.as_str(), names.interactive.as_str()],
                days,
            )
            .await,
            anomalies: detect_anomalies(warehouse, config.cost.anomaly_multiplier).await,
            days,
        }
    }

    /// Prints the report to stdout.
    pub fn print(&self) {
        println!();
        match &self.summary {
            Some(summary) => {
                println!("{}", format!("## TODAY'S COST ({})", summary.date).bold());
                println!("  Credits: {:.2}", summary.total_credits);
                println!("  Est. Cost: ${:.2}", summary.total_cost_usd.bold());
                println!(
                    "  Warehouses: {}; Queries: {}",
                    summary.warehouses_used, summary.total_queries
                );
            }
            None => {
                println!("{}", "## TODAY'S COST (N/A)".bold());
                println!("  {}", "no data".dim());
            }
        }

        if !self.costs.is_empty() {
            println!();
            println!(
                "{}",
                format!("## LAST {} DAYS BY WAREHOUSE", self.days).bold()
            );
            for cost in self.costs.iter().take(PRINTED_COST_DAYS) {
                println!(
                    "  {} ({}): ${:.2}",
                    cost.warehouse, cost.date, cost.cost_usd
                );
            }
        }

        if !self.anomalies.is_empty() {
            println!();
            println!("{}", "## COST ANOMALIES".bold().red());
            for anomaly in &self.anomalies {
                println!(
                    "  {} - {}: {:.2} credits (avg: {:.2}, z-score: {:.2})",
                    anomaly.date,
                    anomaly.warehouse,
                    anomaly.credits.red(),
                    anomaly.avg_credits,
                    anomaly.z_score
                );
            }
        }
    }
}

/// Connects to the init warehouse and prints the cost report.
pub async fn costs(config: Config) -> Result<()> {
    let warehouse = SqlApiWarehouse::connect(&config.warehouse, Compute::Init)
        .await
        .context("failed to connect to the warehouse")?;

    let report = CostReport::collect(&warehouse, &config).await;
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

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn summary_treats_null_aggregates_as_zero() {
        let warehouse = InMemoryWarehouse::new().respond(
            "COUNT(DISTINCT WAREHOUSE_NAME)",
            ResultSet::from_strings(
                &["DATE", "TOTAL_CREDITS", "TOTAL_COST_USD", "WAREHOUSES_USED", "TOTAL_QUERIES"],
                [[Some("2024-05-02"), None, None, Some("0"), Some("0")]],
            ),
        );

        let summary = daily_summary(&warehouse).await.unwrap();
        assert_eq!(summary.date, date(2024, 5, 2));
        assert_eq!(summary.total_credits, 0.0);
        assert_eq!(summary.total_cost_usd, 0.0);

        let executed = warehouse.executed();
        assert_eq!(executed[0].params, vec![Param::Real(CREDIT_PRICE_USD)]);
    }

    #[tokio::test]
    async fn costs_bind_days_and_warehouses() {
        let warehouse = InMemoryWarehouse::new().respond(
            "GROUP BY WAREHOUSE_NAME, DATE(START_TIME)",
            ResultSet::from_strings(
                &["WAREHOUSE_NAME", "DATE", "TOTAL_CREDITS", "ESTIMATED_COST_USD", "QUERY_COUNT"],
                [
                    [Some("INIT_WH"), Some("2024-05-02"), Some("1.5"), Some("4.5"), Some("12")],
                    [Some("CDC_WH"), Some("2024-05-01"), Some("0.25"), Some("0.75"), Some("3")],
                ],
            ),
        );

        let costs = warehouse_costs(&warehouse, ["INIT_WH", "CDC_WH", "FAST_WH"], 7).await;
        assert_eq!(costs.len(), 2);
        assert_eq!(costs[0].warehouse, "INIT_WH");
        assert_eq!(costs[0].cost_usd, 4.5);
        assert_eq!(costs[1].queries, 3);

        let executed = warehouse.executed();
        assert_eq!(executed[0].params[1], Param::Fixed(7));
        assert_eq!(executed[0].params[4], Param::from("FAST_WH"));
    }

    #[tokio::test]
    async fn anomalies_without_variance_have_zero_score() {
        let warehouse = InMemoryWarehouse::new().respond(
            "WITH DAILY_COSTS",
            ResultSet::from_strings(
                &["DATE", "WAREHOUSE_NAME", "CREDITS", "AVG_CREDITS", "Z_SCORE"],
                [
                    [Some("19845"), Some("INIT_WH"), Some("9.0"), Some("2.0"), Some("3.1")],
                    [Some("19844"), Some("CDC_WH"), Some("4.0"), Some("1.0"), None],
                ],
            ),
        );

        let anomalies = detect_anomalies(&warehouse, 2.0).await;
        assert_eq!(anomalies.len(), 2);
        assert_eq!(anomalies[0].z_score, 3.1);
        assert_eq!(anomalies[1].z_score, 0.0);
        assert_eq!(anomalies[1].date, date(2024, 5, 1));
        assert_eq!(warehouse.executed()[0].params, vec![Param::Real(2.0)]);
    }

    #[tokio::test]
    async fn failed_sections_are_reported_empty() {
        clinops_test::tracing::init();
        let warehouse = InMemoryWarehouse::new()
            .fail("WITH DAILY_COSTS", "insufficient privileges")
            .respond(
                "COUNT(DISTINCT WAREHOUSE_NAME)",
                ResultSet::from_strings(
                    &["DATE", "TOTAL_CREDITS", "TOTAL_COST_USD", "WAREHOUSES_USED", "TOTAL_QUERIES"],
                    [[Some("2024-05-02"), Some("2.0"), Some("6.0"), Some("2"), Some("40")]],
                ),
            );

        let report = CostReport::collect(&warehouse, &Config::default()).await;
        assert_eq!(report.summary.unwrap().total_queries, 40);
        assert!(report.costs.is_empty());
        assert!(report.anomalies.is_empty());
        assert_eq!(report.days, 7);
        assert_eq!(warehouse.executed().len(), 3);
    }

    #[tokio::test]
    async fn undecodable_rows_are_reported_empty() {
        let warehouse = InMemoryWarehouse::new().respond(
            "GROUP BY WAREHOUSE_NAME, DATE(START_TIME)",
            ResultSet::from_strings(
                &["WAREHOUSE_NAME", "DATE", "TOTAL_CREDITS", "ESTIMATED_COST_USD", "QUERY_COUNT"],
                [[Some("INIT_WH"), Some("yesterday"), Some("1"), Some("3"), Some("1")]],
            ),
        );

        let costs = warehouse_costs(&warehouse, ["A", "B", "C"], 1).await;
        assert!(costs.is_empty());
    }
}
