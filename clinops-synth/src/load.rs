//! Batched loading of generated records into the raw CDC tables.

use chrono::NaiveDateTime;
use clinops_warehouse::{Param, Warehouse};

use crate::error::GenerateResult;
use crate::generator::{Summary, SyntheticGenerator};
use crate::model::{Encounter, LabResult, Patient};

/// Default number of records per INSERT statement.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// The CDC operation recorded for generated rows.
const CDC_OPERATION: &str = "INSERT";

/// A record that maps onto a raw CDC table.
trait CdcRow {
    /// Fully qualified target table.
    const TABLE: &'static str;
    /// Record columns, in the order [`CdcRow::bind`] pushes values.
    const COLUMNS: &'static [&'static str];

    fn bind(&self, params: &mut Vec<Param>);
}

impl CdcRow for Patient {
    const TABLE: &'static str = "RAW.PATIENTS_CDC";
    const COLUMNS: &'static [&'static str] = &[
        "PATIENT_ID",
        "FIRST_NAME",
        "LAST_NAME",
        "DATE_OF_BIRTH",
        "GENDER",
        "SSN",
        "EMAIL",
        "PHONE",
        "ADDRESS",
        "CITY",
        "STATE",
        "ZIP_CODE",
        "CREATED_AT",
        "UPDATED_AT",
    ];

    fn bind(&self, params: &mut Vec<Param>) {
        let values: [Param; 14] = [
            self.patient_id.as_str().into(),
            self.first_name.as_str().into(),
            self.last_name.as_str().into(),
            Param::Text(self.date_of_birth.format("%Y-%m-%d").to_string()),
            self.gender.into(),
            self.ssn.as_str().into(),
            self.email.as_str().into(),
            self.phone.as_str().into(),
            self.address.as_str().into(),
            self.city.as_str().into(),
            self.state.as_str().into(),
            self.zip_code.as_str().into(),
            self.created_at.into(),
            self.updated_at.into(),
        ];
        params.extend(values);
    }
}

impl CdcRow for Encounter {
    const TABLE: &'static str = "RAW.ENCOUNTERS_CDC";
    const COLUMNS: &'static [&'static str] = &[
        "ENCOUNTER_ID",
        "PATIENT_ID",
        "ENCOUNTER_TYPE",
        "ENCOUNTER_DATE",
        "PROVIDER_ID",
        "FACILITY_ID",
        "CHIEF_COMPLAINT",
        "DIAGNOSIS_CODE",
        "DIAGNOSIS_DESCRIPTION",
        "DISCHARGE_DATE",
        "STATUS",
        "CREATED_AT",
        "UPDATED_AT",
    ];

    fn bind(&self, params: &mut Vec<Param>) {
        let values: [Param; 13] = [
            self.encounter_id.as_str().into(),
            self.patient_id.as_str().into(),
            self.encounter_type.as_str().into(),
            self.encounter_date.into(),
            self.provider_id.as_str().into(),
            self.facility_id.as_str().into(),
            self.chief_complaint.as_str().into(),
            self.diagnosis_code.into(),
            self.diagnosis_description.into(),
            self.discharge_date.into(),
            self.status.into(),
            self.created_at.into(),
            self.updated_at.into(),
        ];
        params.extend(values);
    }
}

impl CdcRow for LabResult {
    const TABLE: &'static str = "RAW.LAB_RESULTS_CDC";
    const COLUMNS: &'static [&'static str] = &[
        "LAB_RESULT_ID",
        "ENCOUNTER_ID",
        "PATIENT_ID",
        "TEST_CODE",
        "TEST_NAME",
        "RESULT_VALUE",
        "RESULT_UNIT",
        "REFERENCE_RANGE",
        "ABNORMAL_FLAG",
        "TEST_DATE",
        "RESULT_DATE",
        "PROVIDER_ID",
        "CREATED_AT",
        "UPDATED_AT",
    ];

    fn bind(&self, params: &mut Vec<Param>) {
        let values: [Param; 14] = [
            self.lab_result_id.as_str().into(),
            self.encounter_id.as_str().into(),
            self.patient_id.as_str().into(),
            self.test_code.into(),
            self.test_name.as_str().into(),
            // `{:?}` keeps the decimal point on whole numbers, e.g. `300.0`
            Param::Text(format!("{:?}", self.result_value)),
            self.result_unit.into(),
            self.reference_range.into(),
            self.abnormal_flag.map(|flag| flag.as_str()).into(),
            self.test_date.into(),
            self.result_date.into(),
            self.provider_id.as_str().into(),
            self.created_at.into(),
            self.updated_at.into(),
        ];
        params.extend(values);
    }
}

fn insert_statement<T: CdcRow>(rows: usize) -> String {
    let placeholders = vec!["?"; T::COLUMNS.len() + 2].join(", ");
    let tuples = vec![format!("({placeholders})"); rows].join(", ");
    format!(
        "INSERT INTO {} (CDC_OPERATION, CDC_TIMESTAMP, {}) VALUES {tuples}",
        T::TABLE,
        T::COLUMNS.join(", ")
    )
}

async fn load_table<T: CdcRow + Sync>(
    warehouse: &dyn Warehouse,
    records: &[T],
    cdc_timestamp: NaiveDateTime,
    batch_size: usize,
) -> GenerateResult<usize> {
    tracing::info!(table = T::TABLE, records = records.len(), "loading table");
    warehouse
        .execute(&format!("TRUNCATE TABLE IF EXISTS {}", T::TABLE), &[])
        .await?;

    let mut loaded = 0;
    for batch in records.chunks(batch_size.max(1)) {
        let mut params = Vec::with_capacity(batch.len() * (T::COLUMNS.len() + 2));
        for record in batch {
            params.push(Param::from(CDC_OPERATION));
            params.push(Param::from(cdc_timestamp));
            record.bind(&mut params);
        }

        warehouse
            .execute(&insert_statement::<T>(batch.len()), &params)
            .await?;
        loaded += batch.len();
        tracing::debug!(table = T::TABLE, loaded, "inserted batch");
    }

    Ok(loaded)
}

/// Truncates the raw CDC tables and inserts every generated record as an `INSERT` change.
///
/// Tables of phases that have not run are left untouched. Returns the number of records loaded
/// per table.
pub async fn load_generated(
    warehouse: &dyn Warehouse,
    generator: &SyntheticGenerator,
    cdc_timestamp: NaiveDateTime,
    batch_size: usize,
) -> GenerateResult<Summary> {
    let mut summary = Summary::default();

    if !generator.patients().is_empty() {
        summary.patients =
            load_table(warehouse, generator.patients(), cdc_timestamp, batch_size).await?;
    }
    if !generator.encounters().is_empty() {
        summary.encounters =
            load_table(warehouse, generator.encounters(), cdc_timestamp, batch_size).await?;
    }
    if !generator.lab_results().is_empty() {
        summary.lab_results =
            load_table(warehouse, generator.lab_results(), cdc_timestamp, batch_size).await?;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_has_one_tuple_per_row() {
        let sql = insert_statement::<Encounter>(2);

        assert!(sql.starts_with(
            "INSERT INTO RAW.ENCOUNTERS_CDC (CDC_OPERATION, CDC_TIMESTAMP, ENCOUNTER_ID,"
        ));
        assert_eq!(sql.matches('?').count(), 2 * 15);
        assert_eq!(sql.matches("), (").count(), 1);
    }

    #[test]
    fn binds_match_columns() {
        let mut generator = SyntheticGenerator::builder()
            .patients(3)
            .seed(1)
            .build()
            .unwrap();
        generator.generate_all().unwrap();

        let mut params = Vec::new();
        generator.patients()[0].bind(&mut params);
        assert_eq!(params.len(), Patient::COLUMNS.len());

        params.clear();
        generator.encounters()[0].bind(&mut params);
        assert_eq!(params.len(), Encounter::COLUMNS.len());

        if let Some(lab) = generator.lab_results().first() {
            params.clear();
            lab.bind(&mut params);
            assert_eq!(params.len(), LabResult::COLUMNS.len());
        }
    }
}
