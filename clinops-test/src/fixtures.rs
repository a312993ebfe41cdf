//! Scripted warehouses answering the dashboard queries with plausible rows.

use clinops_warehouse::{InMemoryWarehouse, ResultSet};

/// Patient ids `PAT-00000000`, `PAT-00000001`, ... as returned by the patient sample.
pub fn patient_ids(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("PAT-{i:08X}")).collect()
}

/// The rows of the patient sample query.
pub fn patient_sample(count: usize) -> ResultSet {
    let ids = patient_ids(count);
    ResultSet::from_strings(&["PATIENT_ID"], ids.iter().map(|id| [Some(id.as_str())]))
}

/// One patient summary row.
pub fn patient_summary() -> ResultSet {
    ResultSet::from_strings(
        &[
            "PATIENT_ID",
            "PATIENT_NAME",
            "AGE",
            "GENDER",
            "TOTAL_ENCOUNTERS",
            "LAST_VISIT_DATE",
        ],
        [[
            Some("PAT-00000000"),
            Some("Ada Lovelace"),
            Some("36"),
            Some("Female"),
            Some("4"),
            Some("2024-04-30 09:15:00.000"),
        ]],
    )
}

/// Two recent encounters, one still active.
pub fn recent_encounters() -> ResultSet {
    ResultSet::from_strings(
        &[
            "ENCOUNTER_ID",
            "ENCOUNTER_TYPE",
            "ENCOUNTER_DATE",
            "DIAGNOSIS_DESCRIPTION",
            "STATUS",
        ],
        [
            [
                Some("ENC-0000A1B2"),
                Some("EMERGENCY"),
                Some("2024-04-30 09:15:00.000"),
                Some("Chest pain, unspecified"),
                Some("ACTIVE"),
            ],
            [
                Some("ENC-0000C3D4"),
                Some("OUTPATIENT"),
                Some("2024-02-11 14:00:00.000"),
                Some("Essential (primary) hypertension"),
                Some("DISCHARGED"),
            ],
        ],
    )
}

/// Three recent lab results with mixed flags.
pub fn recent_labs() -> ResultSet {
    ResultSet::from_strings(
        &[
            "TEST_DATE",
            "TEST_NAME",
            "RESULT_VALUE",
            "RESULT_UNIT",
            "REFERENCE_RANGE",
            "ABNORMAL_FLAG",
        ],
        [
            [
                Some("2024-04-30 10:00:00.000"),
                Some("Troponin I"),
                Some("0.91"),
                Some("ng/mL"),
                Some("0.0-0.04"),
                Some("CRITICAL"),
            ],
            [
                Some("2024-04-30 10:00:00.000"),
                Some("Glucose"),
                Some("121.4"),
                Some("mg/dL"),
                Some("70-100"),
                Some("HIGH"),
            ],
            [
                Some("2024-02-11 14:30:00.000"),
                Some("Sodium"),
                Some("139.0"),
                Some("mmol/L"),
                Some("135-145"),
                None,
            ],
        ],
    )
}

/// Emergency visits of the last two hours.
pub fn ed_census() -> ResultSet {
    ResultSet::from_strings(
        &["HOUR", "ED_VISITS", "UNIQUE_PATIENTS"],
        [
            [Some("2024-05-01 13:00:00.000"), Some("6"), Some("5")],
            [Some("2024-05-01 12:00:00.000"), Some("3"), Some("3")],
        ],
    )
}

/// One critical lab alert.
pub fn high_risk_alerts() -> ResultSet {
    ResultSet::from_strings(
        &[
            "PATIENT_ID",
            "PATIENT_NAME",
            "TEST_NAME",
            "RESULT_VALUE",
            "ABNORMAL_FLAG",
            "HOURS_AGO",
        ],
        [[
            Some("PAT-00000000"),
            Some("Ada Lovelace"),
            Some("Troponin I"),
            Some("0.91"),
            Some("CRITICAL"),
            Some("3"),
        ]],
    )
}

/// A warehouse answering the patient sample and every dashboard query.
///
/// The sample returns `patients` ids regardless of the requested limit.
pub fn dashboard_warehouse(patients: usize) -> InMemoryWarehouse {
    InMemoryWarehouse::new()
        .respond("LIMIT ?", patient_sample(patients))
        .respond("AS TOTAL_ENCOUNTERS", patient_summary())
        .respond("e.STATUS", recent_encounters())
        .respond("l.REFERENCE_RANGE", recent_labs())
        .respond("AS ED_VISITS", ed_census())
        .respond("AS HOURS_AGO", high_risk_alerts())
}
