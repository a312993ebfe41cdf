//! CSV export of query results.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone};
use serde::Serialize;

use crate::error::{LoadError, LoadResult};
use crate::result::QueryResult;

#[derive(Serialize)]
struct Record<'a> {
    query_name: &'a str,
    query_id: Option<&'a str>,
    execution_time_ms: f64,
    row_count: u64,
    timestamp: String,
    success: bool,
    error: Option<&'a str>,
}

impl<'a> From<&'a QueryResult> for Record<'a> {
    fn from(result: &'a QueryResult) -> Self {
        Self {
            query_name: result.query_name(),
            query_id: result.query_id(),
            execution_time_ms: result.execution_time_ms(),
            row_count: result.row_count(),
            timestamp: result
                .timestamp()
                .format("%Y-%m-%dT%H:%M:%S%.6f")
                .to_string(),
            success: result.is_success(),
            error: result.error(),
        }
    }
}

/// Writes `results` as CSV with a header row to `writer`.
pub fn write_results<W: io::Write>(writer: W, results: &[QueryResult]) -> LoadResult<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for result in results {
        csv.serialize(Record::from(result))?;
    }
    csv.flush().map_err(|cause| LoadError::Io {
        path: "<writer>".into(),
        cause,
    })?;
    Ok(())
}

/// The name of the result file for a run started at `at`.
pub fn results_file_name<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("dashboard_performance_{}.csv", at.format("%Y%m%d_%H%M%S"))
}

/// Saves `results` to a timestamped file in `dir` and returns its path.
///
/// The directory is created if it does not exist.
pub fn save_results(dir: &Path, results: &[QueryResult]) -> LoadResult<PathBuf> {
    let io_error = |path: &Path| {
        let path = path.display().to_string();
        move |cause| LoadError::Io { path, cause }
    };

    fs::create_dir_all(dir).map_err(io_error(dir))?;
    let path = dir.join(results_file_name(&Local::now()));
    let file = File::create(&path).map_err(io_error(&path))?;
    write_results(file, results)?;

    tracing::info!(path = %path.display(), results = results.len(), "saved results");
    Ok(path)
}
