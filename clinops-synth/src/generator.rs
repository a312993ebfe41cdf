//! The phased generator of patients, encounters and lab results.

use std::fmt;

use chrono::{Months, NaiveDateTime, SubsecRound, TimeDelta, Utc};
use rand::rngs::SmallRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use rand_distr::weighted::WeightedIndex;
use rand_distr::{Distribution, Poisson};

use crate::catalog::{DIAGNOSES, EncounterType, LAB_TESTS, LabTest, ResultClass};
use crate::demographics;
use crate::error::{GenerateError, GenerateResult, Phase};
use crate::ids::IdAllocator;
use crate::model::{Encounter, LabResult, Patient};

const GENDERS: [&str; 3] = ["Male", "Female", "Other"];

const MIN_AGE: u32 = 1;
const MAX_AGE: u32 = 95;
const MAX_ENCOUNTERS: usize = 20;
const MAX_LABS: usize = 10;

/// A builder for creating a [`SyntheticGenerator`].
#[derive(Debug)]
pub struct GeneratorBuilder {
    seed: u64,
    as_of: Option<NaiveDateTime>,
    patients: usize,
    encounters_per_patient: f64,
    labs_per_encounter: f64,
}

impl GeneratorBuilder {
    /// The seed of the RNG driving every draw.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// The instant all generated dates are relative to. Defaults to the current time.
    pub fn as_of(mut self, as_of: NaiveDateTime) -> Self {
        self.as_of = Some(as_of);
        self
    }

    /// Number of patients to generate.
    pub fn patients(mut self, patients: usize) -> Self {
        self.patients = patients;
        self
    }

    /// Mean number of encounters per patient.
    pub fn encounters_per_patient(mut self, mean: f64) -> Self {
        self.encounters_per_patient = mean;
        self
    }

    /// Mean number of lab results per encounter that orders labs.
    pub fn labs_per_encounter(mut self, mean: f64) -> Self {
        self.labs_per_encounter = mean;
        self
    }

    /// Creates the generator.
    pub fn build(self) -> GenerateResult<SyntheticGenerator> {
        let encounter_count = fan_out("encounters_per_patient", self.encounters_per_patient)?;
        let lab_count = fan_out("labs_per_encounter", self.labs_per_encounter)?;

        Ok(SyntheticGenerator {
            rng: SmallRng::seed_from_u64(self.seed),
            as_of: self
                .as_of
                .unwrap_or_else(|| Utc::now().naive_utc())
                .trunc_subsecs(0),
            patient_count: self.patients,

            encounter_count,
            lab_count,
            encounter_types: WeightedIndex::new(EncounterType::WEIGHTS)?,
            result_classes: WeightedIndex::new(ResultClass::WEIGHTS)?,

            ids: IdAllocator::default(),
            patients: None,
            encounters: None,
            lab_results: None,
        })
    }
}

fn fan_out(name: &'static str, mean: f64) -> GenerateResult<Poisson<f64>> {
    Poisson::new(mean).map_err(|_| GenerateError::InvalidMean { name, value: mean })
}

/// Generates a synthetic clinical data set in three dependent phases.
///
/// Patients come first, then encounters for each patient, then lab results for each encounter.
/// Running a phase before the one it builds on fails with [`GenerateError::IllegalState`]; running
/// a phase again discards the phases that depend on it.
///
/// All randomness comes from one seeded RNG owned by the generator, and all dates are relative to
/// a fixed `as_of` instant, so a seed and an instant fully determine the output.
#[derive(Debug)]
pub struct SyntheticGenerator {
    /// The RNG driving all draws.
    rng: SmallRng,
    /// The instant standing in for "now".
    as_of: NaiveDateTime,
    /// Number of patients to generate.
    patient_count: usize,

    /// Encounters per patient, before clamping.
    encounter_count: Poisson<f64>,
    /// Lab results per encounter, before clamping.
    lab_count: Poisson<f64>,
    /// Draws an index into [`EncounterType::ALL`].
    encounter_types: WeightedIndex<f64>,
    /// Draws an index into [`ResultClass::ALL`].
    result_classes: WeightedIndex<f64>,

    /// Keeps identifiers unique across all phases.
    ids: IdAllocator,
    patients: Option<Vec<Patient>>,
    encounters: Option<Vec<Encounter>>,
    lab_results: Option<Vec<LabResult>>,
}

impl SyntheticGenerator {
    /// Constructs a generator builder with the default volumes.
    pub fn builder() -> GeneratorBuilder {
        GeneratorBuilder {
            seed: 42,
            as_of: None,
            patients: 10_000,
            encounters_per_patient: 5.0,
            labs_per_encounter: 3.0,
        }
    }

    /// The instant all generated dates are relative to.
    pub fn as_of(&self) -> NaiveDateTime {
        self.as_of
    }

    /// Generates the patients.
    pub fn generate_patients(&mut self) -> GenerateResult<&[Patient]> {
        tracing::info!(count = self.patient_count, "generating patients");

        let mut patients = Vec::with_capacity(self.patient_count);
        for _ in 0..self.patient_count {
            patients.push(self.patient()?);
        }

        self.encounters = None;
        self.lab_results = None;
        Ok(self.patients.insert(patients).as_slice())
    }

    /// Generates the encounters of every patient.
    pub fn generate_encounters(&mut self) -> GenerateResult<&[Encounter]> {
        let Some(patients) = self.patients.as_deref() else {
            return Err(GenerateError::IllegalState {
                phase: Phase::Encounters,
                requires: Phase::Patients,
            });
        };
        tracing::info!(patients = patients.len(), "generating encounters");

        let mut encounters = Vec::new();
        for patient in patients {
            let count = clamp_count(self.encounter_count.sample(&mut self.rng), MAX_ENCOUNTERS);
            for _ in 0..count {
                let encounter =
                    encounter(&mut self.rng, &mut self.ids, &self.encounter_types, patient);
                encounters.push(encounter);
            }
        }

        self.lab_results = None;
        Ok(self.encounters.insert(encounters).as_slice())
    }

    /// Generates the lab results of every emergency, inpatient and outpatient encounter.
    pub fn generate_lab_results(&mut self) -> GenerateResult<&[LabResult]> {
        let Some(encounters) = self.encounters.as_deref() else {
            return Err(GenerateError::IllegalState {
                phase: Phase::LabResults,
                requires: Phase::Encounters,
            });
        };
        tracing::info!(encounters = encounters.len(), "generating lab results");

        let mut lab_results = Vec::new();
        for encounter in encounters.iter().filter(|e| e.encounter_type.orders_labs()) {
            let count = clamp_count(self.lab_count.sample(&mut self.rng), MAX_LABS);
            let tests: Vec<LabTest> = LAB_TESTS
                .choose_multiple(&mut self.rng, count.min(LAB_TESTS.len()))
                .copied()
                .collect();

            for test in tests {
                let class = ResultClass::ALL[self.result_classes.sample(&mut self.rng)];
                let lab = lab_result(&mut self.rng, &mut self.ids, encounter, &test, class);
                lab_results.push(lab);
            }
        }

        Ok(self.lab_results.insert(lab_results).as_slice())
    }

    /// Runs all three phases in order.
    pub fn generate_all(&mut self) -> GenerateResult<Summary> {
        self.generate_patients()?;
        self.generate_encounters()?;
        self.generate_lab_results()?;

        let summary = self.summary();
        tracing::info!(
            patients = summary.patients,
            encounters = summary.encounters,
            lab_results = summary.lab_results,
            "generated synthetic data"
        );
        Ok(summary)
    }

    /// The generated patients; empty before the first phase ran.
    pub fn patients(&self) -> &[Patient] {
        self.patients.as_deref().unwrap_or_default()
    }

    /// The generated encounters; empty before the second phase ran.
    pub fn encounters(&self) -> &[Encounter] {
        self.encounters.as_deref().unwrap_or_default()
    }

    /// The generated lab results; empty before the third phase ran.
    pub fn lab_results(&self) -> &[LabResult] {
        self.lab_results.as_deref().unwrap_or_default()
    }

    /// Record counts of the data generated so far.
    pub fn summary(&self) -> Summary {
        Summary {
            patients: self.patients().len(),
            encounters: self.encounters().len(),
            lab_results: self.lab_results().len(),
        }
    }

    fn patient(&mut self) -> GenerateResult<Patient> {
        let rng = &mut self.rng;

        let patient_id = self.ids.next("PAT", rng);
        let first_name = demographics::first_name(rng);
        let last_name = demographics::last_name(rng);
        let date_of_birth = date_of_birth(self.as_of, rng)?;
        let gender = GENDERS[rng.random_range(0..GENDERS.len())];
        let email = demographics::email(rng, &first_name, &last_name);
        let created_at = self.as_of - TimeDelta::days(rng.random_range(365..=3650));

        Ok(Patient {
            patient_id,
            first_name,
            last_name,
            date_of_birth,
            gender,
            ssn: demographics::ssn(rng),
            email,
            phone: demographics::phone_number(rng),
            address: demographics::street_address(rng),
            city: demographics::city(rng),
            state: demographics::state_abbr(rng),
            zip_code: demographics::zip_code(rng),
            created_at,
            updated_at: self.as_of,
            deleted_at: None,
        })
    }
}

/// Clamps a Poisson draw to `1..=max`.
fn clamp_count(draw: f64, max: usize) -> usize {
    (draw as usize).clamp(1, max)
}

/// A birth date for an age between [`MIN_AGE`] and [`MAX_AGE`] years on `as_of`.
fn date_of_birth(as_of: NaiveDateTime, rng: &mut SmallRng) -> GenerateResult<chrono::NaiveDate> {
    let today = as_of.date();
    let latest = today.checked_sub_months(Months::new(12 * MIN_AGE));
    let earliest = today
        .checked_sub_months(Months::new(12 * (MAX_AGE + 1)))
        .and_then(|date| date.succ_opt());

    let (Some(earliest), Some(latest)) = (earliest, latest) else {
        return Err(GenerateError::DateOutOfRange(as_of));
    };

    let span = (latest - earliest).num_days();
    Ok(earliest + TimeDelta::days(rng.random_range(0..=span)))
}

fn encounter(
    rng: &mut SmallRng,
    ids: &mut IdAllocator,
    types: &WeightedIndex<f64>,
    patient: &Patient,
) -> Encounter {
    let encounter_type = EncounterType::ALL[types.sample(rng)];
    let encounter_date = patient.created_at + TimeDelta::days(rng.random_range(0..=730));
    let discharge_date = encounter_type
        .is_admitted()
        .then(|| encounter_date + TimeDelta::hours(rng.random_range(2..=240)));
    let diagnosis = DIAGNOSES[rng.random_range(0..DIAGNOSES.len())];

    Encounter {
        encounter_id: ids.next("ENC", rng),
        patient_id: patient.patient_id.clone(),
        encounter_type,
        encounter_date,
        provider_id: format!("PROV-{}", rng.random_range(1000..=9999)),
        facility_id: format!("FAC-{}", rng.random_range(100..=999)),
        chief_complaint: demographics::sentence(rng, 6),
        diagnosis_code: diagnosis.code,
        diagnosis_description: diagnosis.description,
        discharge_date,
        status: if discharge_date.is_some() {
            "DISCHARGED"
        } else {
            "ACTIVE"
        },
        created_at: encounter_date,
        updated_at: discharge_date.unwrap_or(encounter_date),
        deleted_at: None,
    }
}

fn lab_result(
    rng: &mut SmallRng,
    ids: &mut IdAllocator,
    encounter: &Encounter,
    test: &LabTest,
    class: ResultClass,
) -> LabResult {
    let value = test.sample_value(class, rng);
    let test_date = encounter.encounter_date + TimeDelta::hours(rng.random_range(0..=12));
    let result_date = test_date + TimeDelta::hours(rng.random_range(1..=48));

    LabResult {
        lab_result_id: ids.next("LAB", rng),
        encounter_id: encounter.encounter_id.clone(),
        patient_id: encounter.patient_id.clone(),
        test_code: test.code,
        test_name: test.name(),
        result_value: value.value,
        result_unit: test.unit,
        reference_range: test.reference_range,
        abnormal_flag: value.flag,
        test_date,
        result_date,
        provider_id: encounter.provider_id.clone(),
        created_at: result_date,
        updated_at: result_date,
        deleted_at: None,
    }
}

/// Record counts of a generated data set.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Summary {
    /// Number of patients.
    pub patients: usize,
    /// Number of encounters.
    pub encounters: usize,
    /// Number of lab results.
    pub lab_results: usize,
}

impl Summary {
    /// Mean number of encounters per patient.
    pub fn encounters_per_patient(&self) -> f64 {
        ratio(self.encounters, self.patients)
    }

    /// Mean number of lab results per encounter, telehealth visits included.
    pub fn labs_per_encounter(&self) -> f64 {
        ratio(self.lab_results, self.encounters)
    }
}

fn ratio(count: usize, per: usize) -> f64 {
    if per == 0 {
        0.0
    } else {
        count as f64 / per as f64
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Patients: {}", self.patients)?;
        writeln!(f, "Encounters: {}", self.encounters)?;
        writeln!(f, "Lab Results: {}", self.lab_results)?;
        writeln!(f, "Avg Encounters/Patient: {:.1}", self.encounters_per_patient())?;
        write!(f, "Avg Labs/Encounter: {:.1}", self.labs_per_encounter())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use chrono::{Datelike, NaiveDate};

    use super::*;
    use crate::catalog::AbnormalFlag;

    fn as_of() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn generator(patients: usize, seed: u64) -> SyntheticGenerator {
        SyntheticGenerator::builder()
            .seed(seed)
            .as_of(as_of())
            .patients(patients)
            .build()
            .unwrap()
    }

    #[test]
    fn same_seed_same_data() {
        let mut first = generator(50, 42);
        let mut second = generator(50, 42);
        first.generate_all().unwrap();
        second.generate_all().unwrap();

        assert_eq!(first.patients(), second.patients());
        assert_eq!(first.encounters(), second.encounters());
        assert_eq!(first.lab_results(), second.lab_results());

        let mut other = generator(50, 43);
        other.generate_all().unwrap();
        assert_ne!(first.patients(), other.patients());
    }

    #[test]
    fn phases_must_run_in_order() {
        let mut generator = generator(5, 1);

        let err = generator.generate_encounters().unwrap_err();
        assert!(matches!(
            err,
            GenerateError::IllegalState {
                phase: Phase::Encounters,
                requires: Phase::Patients
            }
        ));

        generator.generate_patients().unwrap();
        let err = generator.generate_lab_results().unwrap_err();
        assert_eq!(err.to_string(), "cannot generate lab results before encounters");
    }

    #[test]
    fn regenerating_patients_discards_dependents() {
        let mut generator = generator(5, 1);
        generator.generate_all().unwrap();
        assert!(!generator.encounters().is_empty());

        generator.generate_patients().unwrap();
        assert!(generator.encounters().is_empty());
        assert!(generator.lab_results().is_empty());
        assert!(generator.generate_lab_results().is_err());
    }

    #[test]
    fn rejects_non_positive_means() {
        let err = SyntheticGenerator::builder()
            .labs_per_encounter(0.0)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            GenerateError::InvalidMean {
                name: "labs_per_encounter",
                ..
            }
        ));
    }

    #[test]
    fn patients_fall_in_the_configured_windows() {
        let mut generator = generator(300, 7);
        let patients = generator.generate_patients().unwrap().to_vec();

        assert_eq!(patients.len(), 300);
        for patient in &patients {
            let registered_days = (as_of() - patient.created_at).num_days();
            assert!((365..=3650).contains(&registered_days));

            let today = as_of().date();
            let mut age = today.year() - patient.date_of_birth.year();
            if today.ordinal() < patient.date_of_birth.ordinal() {
                age -= 1;
            }
            assert!((0..=96).contains(&age), "{patient:?}");
            assert!(patient.date_of_birth <= today.checked_sub_months(Months::new(12)).unwrap());

            assert!(GENDERS.contains(&patient.gender));
            assert_eq!(patient.deleted_at, None);
            assert_eq!(patient.updated_at, as_of());
        }
    }

    #[test]
    fn ids_are_unique_and_keys_resolve() {
        let mut generator = generator(200, 3);
        generator.generate_all().unwrap();

        let patients: HashMap<_, _> = generator
            .patients()
            .iter()
            .map(|p| (p.patient_id.as_str(), p))
            .collect();
        let encounters: HashMap<_, _> = generator
            .encounters()
            .iter()
            .map(|e| (e.encounter_id.as_str(), e))
            .collect();
        assert_eq!(patients.len(), generator.patients().len());
        assert_eq!(encounters.len(), generator.encounters().len());

        let labs: HashSet<_> = generator
            .lab_results()
            .iter()
            .map(|l| l.lab_result_id.as_str())
            .collect();
        assert_eq!(labs.len(), generator.lab_results().len());

        for encounter in generator.encounters() {
            assert!(encounter.encounter_id.starts_with("ENC-"));
            assert!(patients.contains_key(encounter.patient_id.as_str()));
        }
        for lab in generator.lab_results() {
            assert!(lab.lab_result_id.starts_with("LAB-"));
            let encounter = encounters[lab.encounter_id.as_str()];
            assert_eq!(lab.patient_id, encounter.patient_id);
            assert_eq!(lab.provider_id, encounter.provider_id);
        }
    }

    #[test]
    fn dates_are_ordered() {
        let mut generator = generator(200, 11);
        generator.generate_all().unwrap();

        let created: HashMap<_, _> = generator
            .patients()
            .iter()
            .map(|p| (p.patient_id.as_str(), p.created_at))
            .collect();
        let encounter_dates: HashMap<_, _> = generator
            .encounters()
            .iter()
            .map(|e| (e.encounter_id.as_str(), e.encounter_date))
            .collect();

        for encounter in generator.encounters() {
            let registered = created[encounter.patient_id.as_str()];
            assert!(encounter.encounter_date >= registered);
            assert!(encounter.encounter_date <= registered + TimeDelta::days(730));

            match encounter.discharge_date {
                Some(discharge) => {
                    assert!(encounter.encounter_type.is_admitted());
                    let stay = (discharge - encounter.encounter_date).num_hours();
                    assert!((2..=240).contains(&stay));
                    assert_eq!(encounter.status, "DISCHARGED");
                    assert_eq!(encounter.updated_at, discharge);
                }
                None => {
                    assert!(!encounter.encounter_type.is_admitted());
                    assert_eq!(encounter.status, "ACTIVE");
                    assert_eq!(encounter.updated_at, encounter.encounter_date);
                }
            }
        }

        for lab in generator.lab_results() {
            let encounter_date = encounter_dates[lab.encounter_id.as_str()];
            let wait = (lab.test_date - encounter_date).num_hours();
            let turnaround = (lab.result_date - lab.test_date).num_hours();
            assert!((0..=12).contains(&wait));
            assert!((1..=48).contains(&turnaround));
            assert_eq!(lab.created_at, lab.result_date);
            assert_eq!(lab.updated_at, lab.result_date);
        }
    }

    #[test]
    fn fan_out_is_clamped() {
        let mut generator = SyntheticGenerator::builder()
            .seed(5)
            .as_of(as_of())
            .patients(200)
            .encounters_per_patient(0.01)
            .labs_per_encounter(50.0)
            .build()
            .unwrap();
        generator.generate_all().unwrap();

        let mut per_patient: HashMap<&str, usize> = HashMap::new();
        for encounter in generator.encounters() {
            *per_patient.entry(encounter.patient_id.as_str()).or_default() += 1;
        }
        assert_eq!(per_patient.len(), 200);
        assert!(per_patient.values().all(|&count| (1..=MAX_ENCOUNTERS).contains(&count)));

        let mut per_encounter: HashMap<&str, Vec<&str>> = HashMap::new();
        for lab in generator.lab_results() {
            per_encounter
                .entry(lab.encounter_id.as_str())
                .or_default()
                .push(lab.test_code);
        }
        for codes in per_encounter.values() {
            assert_eq!(codes.len(), LAB_TESTS.len());
            let unique: HashSet<_> = codes.iter().collect();
            assert_eq!(unique.len(), codes.len());
        }

        let with_labs = generator
            .encounters()
            .iter()
            .filter(|e| e.encounter_type.orders_labs())
            .count();
        assert_eq!(per_encounter.len(), with_labs);
    }

    #[test]
    fn telehealth_orders_no_labs() {
        let mut generator = generator(300, 9);
        generator.generate_all().unwrap();

        let telehealth: HashSet<_> = generator
            .encounters()
            .iter()
            .filter(|e| e.encounter_type == EncounterType::Telehealth)
            .map(|e| e.encounter_id.as_str())
            .collect();
        assert!(!telehealth.is_empty());
        assert!(
            generator
                .lab_results()
                .iter()
                .all(|l| !telehealth.contains(l.encounter_id.as_str()))
        );
    }

    #[test]
    fn lab_values_match_their_flags() {
        let mut generator = generator(500, 21);
        generator.generate_all().unwrap();

        let mut critical = 0;
        for lab in generator.lab_results() {
            let test = LAB_TESTS.iter().find(|t| t.code == lab.test_code).unwrap();
            let value = lab.result_value;
            match lab.abnormal_flag {
                None => assert!(test.normal_min <= value && value <= test.normal_max),
                Some(AbnormalFlag::High) => assert!(value >= test.normal_max),
                Some(AbnormalFlag::Low) => assert!(value <= test.normal_min),
                Some(AbnormalFlag::Critical) => critical += 1,
            }
            assert_eq!(lab.reference_range, test.reference_range);
            assert_eq!(lab.result_unit, test.unit);
        }
        assert!(critical > 0);
    }

    #[test]
    fn summary_reports_ratios() {
        let summary = Summary {
            patients: 4,
            encounters: 10,
            lab_results: 25,
        };
        assert_eq!(summary.encounters_per_patient(), 2.5);
        assert_eq!(summary.labs_per_encounter(), 2.5);
        assert!(summary.to_string().contains("Avg Encounters/Patient: 2.5"));
        assert_eq!(Summary::default().labs_per_encounter(), 0.0);
    }
}
