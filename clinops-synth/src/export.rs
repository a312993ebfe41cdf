//! CSV export of generated records.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{GenerateError, GenerateResult};
use crate::generator::SyntheticGenerator;

/// File the patients are written to.
pub const PATIENTS_FILE: &str = "synthetic_patients.csv";
/// File the encounters are written to.
pub const ENCOUNTERS_FILE: &str = "synthetic_encounters.csv";
/// File the lab results are written to.
pub const LABS_FILE: &str = "synthetic_labs.csv";

/// Writes `records` as CSV with a header row of upper-case column names.
pub fn write_csv<W, T>(writer: W, records: &[T]) -> GenerateResult<()>
where
    W: io::Write,
    T: Serialize,
{
    let mut csv = csv::Writer::from_writer(writer);
    for record in records {
        csv.serialize(record)?;
    }
    csv.flush().map_err(|cause| GenerateError::Io {
        path: "<writer>".into(),
        cause,
    })?;
    Ok(())
}

fn save<T: Serialize>(path: PathBuf, records: &[T]) -> GenerateResult<PathBuf> {
    let file = File::create(&path).map_err(|cause| GenerateError::Io {
        path: path.display().to_string(),
        cause,
    })?;
    write_csv(file, records)?;

    tracing::info!(path = %path.display(), records = records.len(), "saved csv");
    Ok(path)
}

/// Saves every generated phase to its file in `dir` and returns the paths written.
///
/// Phases that have not run are skipped. The directory is created if it does not exist.
pub fn save_csv(dir: &Path, generator: &SyntheticGenerator) -> GenerateResult<Vec<PathBuf>> {
    fs::create_dir_all(dir).map_err(|cause| GenerateError::Io {
        path: dir.display().to_string(),
        cause,
    })?;

    let mut written = Vec::new();
    if !generator.patients().is_empty() {
        written.push(save(dir.join(PATIENTS_FILE), generator.patients())?);
    }
    if !generator.encounters().is_empty() {
        written.push(save(dir.join(ENCOUNTERS_FILE), generator.encounters())?);
    }
    if !generator.lab_results().is_empty() {
        written.push(save(dir.join(LABS_FILE), generator.lab_results())?);
    }
    Ok(written)
}
