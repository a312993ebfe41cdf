//! The dashboard query catalog and the typed rows each query returns.

use std::fmt;

use chrono::NaiveDateTime;
use clinops_warehouse::{FromRow, ResultSet, Row, WarehouseResult};
use serde::Serialize;

/// Sample patients to open dashboards for.
pub const SAMPLE_PATIENTS_SQL: &str = "
    SELECT PATIENT_ID
    FROM CLINICAL_DB.CURATED.PATIENTS
    LIMIT ?
";

/// One of the queries a clinical dashboard issues.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardQuery {
    /// Demographics and visit totals of one patient.
    PatientSummary,
    /// The ten most recent encounters of one patient.
    RecentEncounters,
    /// The twenty most recent lab results of one patient.
    RecentLabs,
    /// Emergency department visits per hour over the last day.
    EdCensus,
    /// Critical lab results over the last day.
    HighRiskAlerts,
}

impl DashboardQuery {
    /// Queries issued when a patient dashboard is opened, in order.
    pub const PATIENT_DASHBOARD: [DashboardQuery; 3] = [
        DashboardQuery::PatientSummary,
        DashboardQuery::RecentEncounters,
        DashboardQuery::RecentLabs,
    ];

    /// Queries refreshed by the operational dashboard, in order.
    pub const OPERATIONAL: [DashboardQuery; 2] =
        [DashboardQuery::EdCensus, DashboardQuery::HighRiskAlerts];

    /// The name used in reports and result files.
    pub fn name(self) -> &'static str {
        match self {
            DashboardQuery::PatientSummary => "patient_summary",
            DashboardQuery::RecentEncounters => "recent_encounters",
            DashboardQuery::RecentLabs => "recent_labs",
            DashboardQuery::EdCensus => "ed_census",
            DashboardQuery::HighRiskAlerts => "high_risk_alerts",
        }
    }

    /// Returns `true` if the query takes the patient id as its only bind parameter.
    pub fn is_patient_scoped(self) -> bool {
        Self::PATIENT_DASHBOARD.contains(&self)
    }

    /// The statement text, with positional `?` binds.
    pub fn sql(self) -> &'static str {
        match self {
            DashboardQuery::PatientSummary => {
                "
                SELECT
                    p.PATIENT_ID,
                    p.FIRST_NAME || ' ' || p.LAST_NAME AS PATIENT_NAME,
                    DATEDIFF('YEAR', p.DATE_OF_BIRTH, CURRENT_DATE()) AS AGE,
                    p.GENDER,
                    COUNT(DISTINCT e.ENCOUNTER_ID) AS TOTAL_ENCOUNTERS,
                    MAX(e.ENCOUNTER_DATE) AS LAST_VISIT_DATE
                FROM CLINICAL_DB.CURATED.PATIENTS p
                LEFT JOIN CLINICAL_DB.CURATED.ENCOUNTERS e ON p.PATIENT_ID = e.PATIENT_ID
                WHERE p.PATIENT_ID = ?
                GROUP BY 1, 2, 3, 4
                "
            }
            DashboardQuery::RecentEncounters => {
                "
                SELECT
                    e.ENCOUNTER_ID,
                    e.ENCOUNTER_TYPE,
                    e.ENCOUNTER_DATE,
                    e.DIAGNOSIS_DESCRIPTION,
                    e.STATUS
                FROM CLINICAL_DB.CURATED.ENCOUNTERS e
                WHERE e.PATIENT_ID = ?
                ORDER BY e.ENCOUNTER_DATE DESC
                LIMIT 10
                "
            }
            DashboardQuery::RecentLabs => {
                "
                SELECT
                    l.TEST_DATE,
                    l.TEST_NAME,
                    l.RESULT_VALUE,
                    l.RESULT_UNIT,
                    l.REFERENCE_RANGE,
                    l.ABNORMAL_FLAG
                FROM CLINICAL_DB.CURATED.LAB_RESULTS l
                WHERE l.PATIENT_ID = ?
                ORDER BY l.TEST_DATE DESC
                LIMIT 20
                "
            }
            DashboardQuery::EdCensus => {
                "
                SELECT
                    DATE_TRUNC('HOUR', e.ENCOUNTER_DATE) AS HOUR,
                    COUNT(*) AS ED_VISITS,
                    COUNT(DISTINCT e.PATIENT_ID) AS UNIQUE_PATIENTS
                FROM CLINICAL_DB.CURATED.ENCOUNTERS e
                WHERE e.ENCOUNTER_TYPE = 'EMERGENCY'
                    AND e.ENCOUNTER_DATE >= DATEADD('HOUR', -24, CURRENT_TIMESTAMP())
                GROUP BY 1
                ORDER BY 1 DESC
                "
            }
            DashboardQuery::HighRiskAlerts => {
                "
                SELECT
                    p.PATIENT_ID,
                    p.FIRST_NAME || ' ' || p.LAST_NAME AS PATIENT_NAME,
                    l.TEST_NAME,
                    l.RESULT_VALUE,
                    l.ABNORMAL_FLAG,
                    DATEDIFF('HOUR', l.TEST_DATE, CURRENT_TIMESTAMP()) AS HOURS_AGO
                FROM CLINICAL_DB.CURATED.LAB_RESULTS l
                INNER JOIN CLINICAL_DB.CURATED.PATIENTS p ON l.PATIENT_ID = p.PATIENT_ID
                WHERE l.ABNORMAL_FLAG = 'CRITICAL'
                    AND l.TEST_DATE >= DATEADD('HOUR', -24, CURRENT_TIMESTAMP())
                ORDER BY l.TEST_DATE DESC
                LIMIT 50
                "
            }
        }
    }

    /// Decodes the rows of this query's result set.
    pub fn decode(self, rows: &ResultSet) -> WarehouseResult<Vec<DashboardRow>> {
        Ok(match self {
            DashboardQuery::PatientSummary => {
                wrap(rows.decode::<PatientSummary>()?, DashboardRow::PatientSummary)
            }
            DashboardQuery::RecentEncounters => {
                wrap(rows.decode::<RecentEncounter>()?, DashboardRow::RecentEncounter)
            }
            DashboardQuery::RecentLabs => {
                wrap(rows.decode::<RecentLab>()?, DashboardRow::RecentLab)
            }
            DashboardQuery::EdCensus => wrap(rows.decode::<EdCensusHour>()?, DashboardRow::EdCensus),
            DashboardQuery::HighRiskAlerts => {
                wrap(rows.decode::<HighRiskAlert>()?, DashboardRow::HighRiskAlert)
            }
        })
    }
}

fn wrap<T>(rows: Vec<T>, variant: fn(T) -> DashboardRow) -> Vec<DashboardRow> {
    rows.into_iter().map(variant).collect()
}

impl fmt::Display for DashboardQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded row of one of the [`DashboardQuery`] result sets.
#[derive(Clone, Debug, PartialEq)]
pub enum DashboardRow {
    /// Row of [`DashboardQuery::PatientSummary`].
    PatientSummary(PatientSummary),
    /// Row of [`DashboardQuery::RecentEncounters`].
    RecentEncounter(RecentEncounter),
    /// Row of [`DashboardQuery::RecentLabs`].
    RecentLab(RecentLab),
    /// Row of [`DashboardQuery::EdCensus`].
    EdCensus(EdCensusHour),
    /// Row of [`DashboardQuery::HighRiskAlerts`].
    HighRiskAlert(HighRiskAlert),
}

/// Demographics and visit totals of one patient.
#[derive(Clone, Debug, PartialEq)]
pub struct PatientSummary {
    /// Patient identifier.
    pub patient_id: String,
    /// First and last name.
    pub patient_name: String,
    /// Age in years.
    pub age: Option<u32>,
    /// Recorded gender.
    pub gender: Option<String>,
    /// Number of distinct encounters.
    pub total_encounters: u64,
    /// Most recent encounter date.
    pub last_visit: Option<NaiveDateTime>,
}

impl FromRow for PatientSummary {
    fn from_row(row: &Row) -> WarehouseResult<Self> {
        Ok(Self {
            patient_id: row.text(0)?.to_owned(),
            patient_name: row.text(1)?.to_owned(),
            age: row.get_opt(2)?,
            gender: row.get_opt(3)?,
            total_encounters: row.get(4)?,
            last_visit: row.timestamp_opt(5)?,
        })
    }
}

/// One recent encounter of a patient.
#[derive(Clone, Debug, PartialEq)]
pub struct RecentEncounter {
    /// Encounter identifier.
    pub encounter_id: String,
    /// Encounter type, e.g. `EMERGENCY`.
    pub encounter_type: String,
    /// Start of the encounter.
    pub encounter_date: NaiveDateTime,
    /// Primary diagnosis.
    pub diagnosis_description: Option<String>,
    /// `ACTIVE` or `DISCHARGED`.
    pub status: Option<String>,
}

impl FromRow for RecentEncounter {
    fn from_row(row: &Row) -> WarehouseResult<Self> {
        Ok(Self {
            encounter_id: row.text(0)?.to_owned(),
            encounter_type: row.text(1)?.to_owned(),
            encounter_date: row.timestamp(2)?,
            diagnosis_description: row.get_opt(3)?,
            status: row.get_opt(4)?,
        })
    }
}

/// One recent lab result of a patient.
#[derive(Clone, Debug, PartialEq)]
pub struct RecentLab {
    /// When the specimen was taken.
    pub test_date: NaiveDateTime,
    /// Human readable test name.
    pub test_name: String,
    /// Result value as recorded.
    pub result_value: Option<String>,
    /// Unit of the result value.
    pub result_unit: Option<String>,
    /// Normal range, e.g. `4.0-5.6`.
    pub reference_range: Option<String>,
    /// `HIGH`, `LOW`, `CRITICAL` or empty.
    pub abnormal_flag: Option<String>,
}

impl FromRow for RecentLab {
    fn from_row(row: &Row) -> WarehouseResult<Self> {
        Ok(Self {
            test_date: row.timestamp(0)?,
            test_name: row.text(1)?.to_owned(),
            result_value: row.get_opt(2)?,
            result_unit: row.get_opt(3)?,
            reference_range: row.get_opt(4)?,
            abnormal_flag: row.get_opt(5)?,
        })
    }
}

/// Emergency department visits within one hour.
#[derive(Clone, Debug, PartialEq)]
pub struct EdCensusHour {
    /// Start of the hour.
    pub hour: NaiveDateTime,
    /// Number of visits.
    pub ed_visits: u64,
    /// Number of distinct patients.
    pub unique_patients: u64,
}

impl FromRow for EdCensusHour {
    fn from_row(row: &Row) -> WarehouseResult<Self> {
        Ok(Self {
            hour: row.timestamp(0)?,
            ed_visits: row.get(1)?,
            unique_patients: row.get(2)?,
        })
    }
}

/// A critical lab result.
#[derive(Clone, Debug, PartialEq)]
pub struct HighRiskAlert {
    /// Patient identifier.
    pub patient_id: String,
    /// First and last name.
    pub patient_name: String,
    /// Human readable test name.
    pub test_name: String,
    /// Result value as recorded.
    pub result_value: Option<String>,
    /// Always `CRITICAL`.
    pub abnormal_flag: String,
    /// Hours since the specimen was taken.
    pub hours_ago: i64,
}

impl FromRow for HighRiskAlert {
    fn from_row(row: &Row) -> WarehouseResult<Self> {
        Ok(Self {
            patient_id: row.text(0)?.to_owned(),
            patient_name: row.text(1)?.to_owned(),
            test_name: row.text(2)?.to_owned(),
            result_value: row.get_opt(3)?,
            abnormal_flag: row.text(4)?.to_owned(),
            hours_ago: row.get(5)?,
        })
    }
}

/// A sampled patient id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatientId(pub String);

impl FromRow for PatientId {
    fn from_row(row: &Row) -> WarehouseResult<Self> {
        Ok(Self(row.text(0)?.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patient_queries_take_one_bind() {
        for query in DashboardQuery::PATIENT_DASHBOARD {
            assert!(query.is_patient_scoped());
            assert_eq!(query.sql().matches('?').count(), 1, "{query}");
        }
        for query in DashboardQuery::OPERATIONAL {
            assert!(!query.is_patient_scoped());
            assert!(!query.sql().contains('?'), "{query}");
        }
    }

    #[test]
    fn decodes_into_tagged_rows() {
        let rows = ResultSet::from_strings(
            &["HOUR", "ED_VISITS", "UNIQUE_PATIENTS"],
            [[Some("2024-05-01 13:00:00"), Some("12"), Some("11")]],
        );

        let decoded = DashboardQuery::EdCensus.decode(&rows).unwrap();
        let [DashboardRow::EdCensus(hour)] = decoded.as_slice() else {
            panic!("unexpected rows: {decoded:?}");
        };
        assert_eq!(hour.ed_visits, 12);
        assert_eq!(hour.unique_patients, 11);
    }

    #[test]
    fn summary_allows_missing_visits() {
        let rows = ResultSet::from_strings(
            &["PATIENT_ID", "PATIENT_NAME", "AGE", "GENDER", "TOTAL_ENCOUNTERS", "LAST_VISIT_DATE"],
            [[Some("PAT-1"), Some("Ada Lovelace"), Some("36"), None, Some("0"), None]],
        );

        let decoded = DashboardQuery::PatientSummary.decode(&rows).unwrap();
        let [DashboardRow::PatientSummary(summary)] = decoded.as_slice() else {
            panic!("unexpected rows: {decoded:?}");
        };
        assert_eq!(summary.age, Some(36));
        assert_eq!(summary.last_visit, None);
    }

    #[test]
    fn rejects_malformed_rows() {
        let rows = ResultSet::from_strings(
            &["ENCOUNTER_ID", "ENCOUNTER_TYPE", "ENCOUNTER_DATE"],
            [[Some("ENC-1"), Some("INPATIENT"), Some("yesterday")]],
        );

        assert!(DashboardQuery::RecentEncounters.decode(&rows).is_err());
    }
}
