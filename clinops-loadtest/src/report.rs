//! Latency statistics and SLA verdicts over a completed load run.

use std::collections::BTreeMap;

use yansi::Paint;

use crate::query::DashboardQuery;
use crate::result::QueryResult;

/// Returns the nearest-rank percentile of an ascending slice.
///
/// The element at `floor(len * pct / 100)` is returned, clamped to the last element. Returns `None`
/// for an empty slice.
pub fn percentile(sorted: &[f64], pct: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = (sorted.len() as f64 * pct / 100.0).floor() as usize;
    Some(sorted[rank.min(last)])
}

fn median(sorted: &[f64]) -> Option<f64> {
    let len = sorted.len();
    match len {
        0 => None,
        _ if len % 2 == 1 => Some(sorted[len / 2]),
        _ => Some((sorted[len / 2 - 1] + sorted[len / 2]) / 2.0),
    }
}

/// The latency target a run is judged against.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SlaPolicy {
    /// Samples strictly below this latency count towards the target.
    pub threshold_ms: f64,
    /// Minimum share of samples below the threshold, in percent.
    pub target_pct: f64,
}

impl Default for SlaPolicy {
    fn default() -> Self {
        Self {
            threshold_ms: 100.0,
            target_pct: 95.0,
        }
    }
}

/// Statistics over a non-empty set of latency samples.
#[derive(Clone, Debug, PartialEq)]
pub struct LatencyStats {
    /// Number of samples.
    pub count: usize,
    /// Arithmetic mean.
    pub mean_ms: f64,
    /// Median; the mean of the two middle samples for an even count.
    pub median_ms: f64,
    /// Smallest sample.
    pub min_ms: f64,
    /// Largest sample.
    pub max_ms: f64,
    /// Nearest-rank 95th percentile.
    pub p95_ms: f64,
    /// Nearest-rank 99th percentile.
    pub p99_ms: f64,
    /// Share of samples strictly below the policy threshold, in percent.
    pub under_threshold_pct: f64,
    /// Whether `under_threshold_pct` reaches the policy target.
    pub sla_met: bool,
}

/// The latency of a group of executions.
#[derive(Clone, Debug, PartialEq)]
pub enum LatencySummary {
    /// No successful sample to compute statistics from.
    NoData,
    /// Statistics over the successful samples.
    Measured(LatencyStats),
}

impl LatencySummary {
    /// Computes statistics over `samples` in milliseconds, in any order.
    pub fn from_samples(mut samples: Vec<f64>, policy: SlaPolicy) -> Self {
        samples.retain(|sample| sample.is_finite());
        if samples.is_empty() {
            return Self::NoData;
        }
        samples.sort_by(f64::total_cmp);

        let count = samples.len();
        let min_ms = samples[0];
        let max_ms = samples[count - 1];
        let sum: f64 = samples.iter().sum();
        let under = samples
            .iter()
            .filter(|&&sample| sample < policy.threshold_ms)
            .count();
        let under_threshold_pct = under as f64 * 100.0 / count as f64;

        Self::Measured(LatencyStats {
            count,
            // summation error must not push the mean outside the sample range
            mean_ms: (sum / count as f64).clamp(min_ms, max_ms),
            median_ms: median(&samples).unwrap_or(min_ms),
            min_ms,
            max_ms,
            p95_ms: percentile(&samples, 95.0).unwrap_or(max_ms),
            p99_ms: percentile(&samples, 99.0).unwrap_or(max_ms),
            under_threshold_pct,
            sla_met: under_threshold_pct >= policy.target_pct,
        })
    }

    /// The statistics, unless there was no data.
    pub fn stats(&self) -> Option<&LatencyStats> {
        match self {
            Self::NoData => None,
            Self::Measured(stats) => Some(stats),
        }
    }

    /// The SLA verdict, unless there was no data.
    pub fn sla_met(&self) -> Option<bool> {
        self.stats().map(|stats| stats.sla_met)
    }
}

/// Executions and latency of a single query.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryBreakdown {
    /// Number of executions.
    pub executed: usize,
    /// Number of failed executions.
    pub failed: usize,
    /// Latency of the successful executions.
    pub latency: LatencySummary,
}

/// The full report over a load run.
#[derive(Clone, Debug, PartialEq)]
pub struct LatencyReport {
    /// The policy the run was judged against.
    pub policy: SlaPolicy,
    /// Number of executions.
    pub total: usize,
    /// Number of successful executions.
    pub succeeded: usize,
    /// Number of failed executions.
    pub failed: usize,
    /// Breakdown per query that was executed at least once.
    pub per_query: BTreeMap<DashboardQuery, QueryBreakdown>,
    /// Latency over all successful executions.
    pub overall: LatencySummary,
}

impl LatencyReport {
    /// Builds the report. Only successful executions contribute latency samples.
    pub fn build(results: &[QueryResult], policy: SlaPolicy) -> Self {
        let mut samples: BTreeMap<DashboardQuery, (usize, Vec<f64>)> = BTreeMap::new();
        for result in results {
            let (failed, successes) = samples.entry(result.query()).or_default();
            if result.is_success() {
                successes.push(result.execution_time_ms());
            } else {
                *failed += 1;
            }
        }

        let all: Vec<f64> = samples
            .values()
            .flat_map(|(_, successes)| successes.iter().copied())
            .collect();
        let succeeded = all.len();

        let per_query = samples
            .into_iter()
            .map(|(query, (failed, successes))| {
                let breakdown = QueryBreakdown {
                    executed: failed + successes.len(),
                    failed,
                    latency: LatencySummary::from_samples(successes, policy),
                };
                (query, breakdown)
            })
            .collect();

        Self {
            policy,
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            per_query,
            overall: LatencySummary::from_samples(all, policy),
        }
    }

    /// Prints the report to stdout.
    pub fn print(&self) {
        println!();
        println!("{}", "## DASHBOARD PERFORMANCE".bold());
        print!("{} executed, {} succeeded", self.total.bold(), self.succeeded.green());
        if self.failed > 0 {
            print!(", {}", format!("{} FAILED", self.failed).bold().red());
        }
        println!();

        for (query, breakdown) in &self.per_query {
            println!();
            print!(
                "{} ({} runs",
                query.name().bold().blue(),
                breakdown.executed.bold()
            );
            if breakdown.failed > 0 {
                print!(", {}", format!("{} FAILURES", breakdown.failed).bold().red());
            }
            println!(")");
            self.print_summary(&breakdown.latency);
        }

        println!();
        println!("{}", "## OVERALL".bold());
        self.print_summary(&self.overall);
    }

    fn print_summary(&self, summary: &LatencySummary) {
        let Some(stats) = summary.stats() else {
            println!("  {}", "no successful samples".dim());
            return;
        };

        println!(
            "  mean: {:.2}ms; median: {:.2}ms; min: {:.2}ms; max: {:.2}ms",
            stats.mean_ms.bold(),
            stats.median_ms,
            stats.min_ms,
            stats.max_ms
        );
        println!("  p95: {:.2}ms; p99: {:.2}ms", stats.p95_ms.bold(), stats.p99_ms);

        let verdict = if stats.sla_met {
            "SLA MET".bold().green()
        } else {
            "SLA MISSED".bold().red()
        };
        println!(
            "  {:.1}% under {}ms (target {}%): {verdict}",
            stats.under_threshold_pct, self.policy.threshold_ms, self.policy.target_pct
        );
    }
}
