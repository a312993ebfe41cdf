use chrono::{NaiveDate, NaiveDateTime};
use clinops_synth::export::{self, ENCOUNTERS_FILE, LABS_FILE, PATIENTS_FILE};
use clinops_synth::load::load_generated;
use clinops_synth::SyntheticGenerator;
use clinops_warehouse::{InMemoryWarehouse, Param};

fn as_of() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1)
        .unwrap()
        .and_hms_opt(8, 30, 0)
        .unwrap()
}

fn generated(patients: usize) -> SyntheticGenerator {
    let mut generator = SyntheticGenerator::builder()
        .seed(42)
        .as_of(as_of())
        .patients(patients)
        .build()
        .unwrap();
    generator.generate_all().unwrap();
    generator
}

#[test]
fn same_seed_writes_identical_files() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();

    export::save_csv(first.path(), &generated(300)).unwrap();
    export::save_csv(second.path(), &generated(300)).unwrap();

    for file in [PATIENTS_FILE, ENCOUNTERS_FILE, LABS_FILE] {
        let expected = std::fs::read(first.path().join(file)).unwrap();
        let actual = std::fs::read(second.path().join(file)).unwrap();
        assert!(!expected.is_empty(), "{file}");
        assert!(expected == actual, "{file} differs between runs");
    }
}

#[test]
fn writes_three_files_with_headers() {
    clinops_test::tracing::init();
    let generator = generated(20);
    let tempdir = tempfile::tempdir().unwrap();
    let dir = tempdir.path().join("data");

    let written = export::save_csv(&dir, &generator).unwrap();
    assert_eq!(
        written,
        [
            dir.join(PATIENTS_FILE),
            dir.join(ENCOUNTERS_FILE),
            dir.join(LABS_FILE)
        ]
    );

    let patients = std::fs::read_to_string(dir.join(PATIENTS_FILE)).unwrap();
    let mut lines = patients.lines();
    assert_eq!(
        lines.next().unwrap(),
        "PATIENT_ID,FIRST_NAME,LAST_NAME,DATE_OF_BIRTH,GENDER,SSN,EMAIL,PHONE,ADDRESS,CITY,\
         STATE,ZIP_CODE,CREATED_AT,UPDATED_AT,DELETED_AT"
    );
    assert_eq!(lines.count(), 20);
    assert!(patients.contains(",2024-06-01 08:30:00,"));

    let encounters = std::fs::read_to_string(dir.join(ENCOUNTERS_FILE)).unwrap();
    assert!(encounters.starts_with("ENCOUNTER_ID,PATIENT_ID,ENCOUNTER_TYPE,ENCOUNTER_DATE,"));
    assert_eq!(encounters.lines().count(), generator.encounters().len() + 1);

    let labs = std::fs::read_to_string(dir.join(LABS_FILE)).unwrap();
    assert!(labs.starts_with("LAB_RESULT_ID,ENCOUNTER_ID,PATIENT_ID,TEST_CODE,TEST_NAME,"));
    assert_eq!(labs.lines().count(), generator.lab_results().len() + 1);
}

#[test]
fn skips_phases_that_did_not_run() {
    let mut generator = SyntheticGenerator::builder()
        .as_of(as_of())
        .patients(3)
        .build()
        .unwrap();
    generator.generate_patients().unwrap();

    let tempdir = tempfile::tempdir().unwrap();
    let written = export::save_csv(tempdir.path(), &generator).unwrap();
    assert_eq!(written, [tempdir.path().join(PATIENTS_FILE)]);
}

#[tokio::test]
async fn loads_every_record_in_batches() {
    let generator = generated(25);
    let warehouse = InMemoryWarehouse::new();

    let loaded = load_generated(&warehouse, &generator, as_of(), 10).await.unwrap();
    assert_eq!(loaded, generator.summary());

    let executed = warehouse.executed();
    assert_eq!(executed[0].sql, "TRUNCATE TABLE IF EXISTS RAW.PATIENTS_CDC");

    let patient_inserts: Vec<_> = executed
        .iter()
        .filter(|e| e.sql.starts_with("INSERT INTO RAW.PATIENTS_CDC"))
        .collect();
    assert_eq!(patient_inserts.len(), 3);
    assert_eq!(patient_inserts[2].params.len(), 5 * 16);
    assert_eq!(patient_inserts[0].params[0], Param::from("INSERT"));
    assert_eq!(patient_inserts[0].params[1], Param::from(as_of()));

    let truncates = executed
        .iter()
        .filter(|e| e.sql.starts_with("TRUNCATE"))
        .count();
    assert_eq!(truncates, 3);
}

#[tokio::test]
async fn load_failure_stops_loading() {
    let generator = generated(5);
    let warehouse = InMemoryWarehouse::new().fail("RAW.ENCOUNTERS_CDC", "insufficient privileges");

    let err = load_generated(&warehouse, &generator, as_of(), 100)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("insufficient privileges"));
    assert!(
        warehouse
            .executed()
            .iter()
            .all(|e| !e.sql.contains("LAB_RESULTS_CDC"))
    );
}
