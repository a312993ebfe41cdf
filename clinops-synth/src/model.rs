//! Generated records, serialized with the upper-case column names of the raw tables.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};

use crate::catalog::{AbnormalFlag, EncounterType};

/// Format of all timestamps in CSV files and warehouse binds.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn timestamp<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&value.format(TIMESTAMP_FORMAT))
}

fn timestamp_opt<S: Serializer>(
    value: &Option<NaiveDateTime>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(value) => timestamp(value, serializer),
        None => serializer.serialize_none(),
    }
}

/// A patient and their demographics.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Patient {
    /// `PAT-` followed by eight hex digits.
    pub patient_id: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Birth date.
    pub date_of_birth: NaiveDate,
    /// `Male`, `Female` or `Other`.
    pub gender: &'static str,
    /// Social security number.
    pub ssn: String,
    /// Email address.
    pub email: String,
    /// Phone number.
    pub phone: String,
    /// Street address.
    pub address: String,
    /// City.
    pub city: String,
    /// Two-letter state.
    pub state: String,
    /// Five-digit ZIP code.
    pub zip_code: String,
    /// When the patient was registered.
    #[serde(serialize_with = "timestamp")]
    pub created_at: NaiveDateTime,
    /// Last change of the record.
    #[serde(serialize_with = "timestamp")]
    pub updated_at: NaiveDateTime,
    /// Soft-delete marker; never set on generated records.
    #[serde(serialize_with = "timestamp_opt")]
    pub deleted_at: Option<NaiveDateTime>,
}

/// A visit of a patient.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Encounter {
    /// `ENC-` followed by eight hex digits.
    pub encounter_id: String,
    /// The visiting patient.
    pub patient_id: String,
    /// The setting of the visit.
    pub encounter_type: EncounterType,
    /// Start of the visit.
    #[serde(serialize_with = "timestamp")]
    pub encounter_date: NaiveDateTime,
    /// `PROV-` followed by four digits.
    pub provider_id: String,
    /// `FAC-` followed by three digits.
    pub facility_id: String,
    /// Reason for the visit in the patient's words.
    pub chief_complaint: String,
    /// ICD-10 code.
    pub diagnosis_code: &'static str,
    /// ICD-10 description.
    pub diagnosis_description: &'static str,
    /// End of an emergency or inpatient stay.
    #[serde(serialize_with = "timestamp_opt")]
    pub discharge_date: Option<NaiveDateTime>,
    /// `DISCHARGED` once a discharge date exists, else `ACTIVE`.
    pub status: &'static str,
    /// Equal to the encounter date.
    #[serde(serialize_with = "timestamp")]
    pub created_at: NaiveDateTime,
    /// The discharge date if any, else the encounter date.
    #[serde(serialize_with = "timestamp")]
    pub updated_at: NaiveDateTime,
    /// Soft-delete marker; never set on generated records.
    #[serde(serialize_with = "timestamp_opt")]
    pub deleted_at: Option<NaiveDateTime>,
}

/// A lab result taken during an encounter.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct LabResult {
    /// `LAB-` followed by eight hex digits.
    pub lab_result_id: String,
    /// The encounter the specimen was taken in.
    pub encounter_id: String,
    /// The patient of that encounter.
    pub patient_id: String,
    /// Upper-case test code.
    pub test_code: &'static str,
    /// Display name of the test.
    pub test_name: String,
    /// Result value, two decimals.
    pub result_value: f64,
    /// Unit of the value.
    pub result_unit: &'static str,
    /// Normal range as printed on reports.
    pub reference_range: &'static str,
    /// Set for results outside the normal range.
    pub abnormal_flag: Option<AbnormalFlag>,
    /// When the specimen was taken.
    #[serde(serialize_with = "timestamp")]
    pub test_date: NaiveDateTime,
    /// When the result was reported.
    #[serde(serialize_with = "timestamp")]
    pub result_date: NaiveDateTime,
    /// The ordering provider, taken from the encounter.
    pub provider_id: String,
    /// Equal to the result date.
    #[serde(serialize_with = "timestamp")]
    pub created_at: NaiveDateTime,
    /// Equal to the result date.
    #[serde(serialize_with = "timestamp")]
    pub updated_at: NaiveDateTime,
    /// Soft-delete marker; never set on generated records.
    #[serde(serialize_with = "timestamp_opt")]
    pub deleted_at: Option<NaiveDateTime>,
}
