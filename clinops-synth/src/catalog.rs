//! Fixed clinical vocabularies: encounter types, diagnoses and the lab test panel.

use std::fmt;

use rand::Rng;
use serde::Serialize;

/// The setting of an encounter.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EncounterType {
    /// Emergency department visit.
    Emergency,
    /// Hospital admission.
    Inpatient,
    /// Ambulatory visit.
    Outpatient,
    /// Remote consultation.
    Telehealth,
}

impl EncounterType {
    /// All encounter types, in the order of [`EncounterType::WEIGHTS`].
    pub const ALL: [EncounterType; 4] = [
        EncounterType::Emergency,
        EncounterType::Inpatient,
        EncounterType::Outpatient,
        EncounterType::Telehealth,
    ];

    /// Relative frequency of each type.
    pub const WEIGHTS: [f64; 4] = [0.15, 0.10, 0.60, 0.15];

    /// The upper-case name stored in the warehouse.
    pub fn as_str(self) -> &'static str {
        match self {
            EncounterType::Emergency => "EMERGENCY",
            EncounterType::Inpatient => "INPATIENT",
            EncounterType::Outpatient => "OUTPATIENT",
            EncounterType::Telehealth => "TELEHEALTH",
        }
    }

    /// Returns `true` if encounters of this type end with a discharge.
    pub fn is_admitted(self) -> bool {
        matches!(self, EncounterType::Emergency | EncounterType::Inpatient)
    }

    /// Returns `true` if specimens are taken during encounters of this type.
    pub fn orders_labs(self) -> bool {
        self != EncounterType::Telehealth
    }
}

impl fmt::Display for EncounterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ICD-10 diagnosis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Diagnosis {
    /// The ICD-10 code.
    pub code: &'static str,
    /// Its description.
    pub description: &'static str,
}

/// Common conditions diagnoses are drawn from.
pub const DIAGNOSES: [Diagnosis; 10] = [
    Diagnosis {
        code: "E11.9",
        description: "Type 2 diabetes mellitus without complications",
    },
    Diagnosis {
        code: "I10",
        description: "Essential (primary) hypertension",
    },
    Diagnosis {
        code: "J44.9",
        description: "Chronic obstructive pulmonary disease, unspecified",
    },
    Diagnosis {
        code: "E78.5",
        description: "Hyperlipidemia, unspecified",
    },
    Diagnosis {
        code: "J06.9",
        description: "Acute upper respiratory infection, unspecified",
    },
    Diagnosis {
        code: "M25.50",
        description: "Pain in unspecified joint",
    },
    Diagnosis {
        code: "R51",
        description: "Headache",
    },
    Diagnosis {
        code: "K21.9",
        description: "Gastro-esophageal reflux disease without esophagitis",
    },
    Diagnosis {
        code: "E66.9",
        description: "Obesity, unspecified",
    },
    Diagnosis {
        code: "F41.9",
        description: "Anxiety disorder, unspecified",
    },
];

/// A lab test with its normal range and critical threshold.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LabTest {
    /// Upper-case test code.
    pub code: &'static str,
    /// Unit of the result value.
    pub unit: &'static str,
    /// Lower bound of the normal range.
    pub normal_min: f64,
    /// Upper bound of the normal range.
    pub normal_max: f64,
    /// Value at which a result becomes critical.
    pub critical_threshold: f64,
    /// The normal range as printed on reports.
    pub reference_range: &'static str,
}

impl LabTest {
    /// The display name: the code in title case, e.g. `Hba1C` for `HBA1C`.
    pub fn name(&self) -> String {
        let mut name = String::with_capacity(self.code.len());
        let mut after_letter = false;
        for c in self.code.chars() {
            if c == '_' {
                name.push(' ');
            } else if after_letter {
                name.extend(c.to_lowercase());
            } else {
                name.extend(c.to_uppercase());
            }
            after_letter = c.is_alphabetic();
        }
        name
    }

    /// Returns `true` if critical results lie below the normal range.
    pub fn critical_is_low(&self) -> bool {
        self.critical_threshold < self.normal_min
    }

    /// Draws a result value of the given class, rounded to two decimals.
    ///
    /// Critical values of tests whose threshold lies below the normal range are drawn from
    /// `[0.5 * threshold, threshold]` instead of `[1.5 * normal_max, threshold]`, which would
    /// otherwise place them above the normal range.
    pub fn sample_value<R: Rng>(&self, class: ResultClass, rng: &mut R) -> LabValue {
        let (low, high, flag) = match class {
            ResultClass::Normal => (self.normal_min, self.normal_max, None),
            ResultClass::Abnormal if rng.random_bool(0.5) => (
                self.normal_max,
                self.normal_max * 1.5,
                Some(AbnormalFlag::High),
            ),
            ResultClass::Abnormal => (
                self.normal_min * 0.5,
                self.normal_min,
                Some(AbnormalFlag::Low),
            ),
            ResultClass::Critical if self.critical_is_low() => (
                self.critical_threshold * 0.5,
                self.critical_threshold,
                Some(AbnormalFlag::Critical),
            ),
            ResultClass::Critical => (
                self.normal_max * 1.5,
                self.critical_threshold,
                Some(AbnormalFlag::Critical),
            ),
        };

        let (low, high) = if low <= high { (low, high) } else { (high, low) };
        let value = rng.random_range(low..=high);
        LabValue {
            value: (value * 100.0).round() / 100.0,
            flag,
        }
    }
}

/// The lab panel results are drawn from.
pub const LAB_TESTS: [LabTest; 8] = [
    LabTest {
        code: "HBA1C",
        unit: "%",
        normal_min: 4.0,
        normal_max: 5.6,
        critical_threshold: 9.0,
        reference_range: "4.0-5.6",
    },
    LabTest {
        code: "GLUCOSE",
        unit: "mg/dL",
        normal_min: 70.0,
        normal_max: 100.0,
        critical_threshold: 250.0,
        reference_range: "70-100",
    },
    LabTest {
        code: "WBC",
        unit: "K/uL",
        normal_min: 4.5,
        normal_max: 11.0,
        critical_threshold: 20.0,
        reference_range: "4.5-11.0",
    },
    LabTest {
        code: "HEMOGLOBIN",
        unit: "g/dL",
        normal_min: 12.0,
        normal_max: 16.0,
        critical_threshold: 7.0,
        reference_range: "12.0-16.0",
    },
    LabTest {
        code: "CREATININE",
        unit: "mg/dL",
        normal_min: 0.6,
        normal_max: 1.2,
        critical_threshold: 3.0,
        reference_range: "0.6-1.2",
    },
    LabTest {
        code: "ALT",
        unit: "U/L",
        normal_min: 7.0,
        normal_max: 56.0,
        critical_threshold: 200.0,
        reference_range: "7-56",
    },
    LabTest {
        code: "CHOLESTEROL",
        unit: "mg/dL",
        normal_min: 125.0,
        normal_max: 200.0,
        critical_threshold: 300.0,
        reference_range: "125-200",
    },
    LabTest {
        code: "TROPONIN",
        unit: "ng/mL",
        normal_min: 0.0,
        normal_max: 0.04,
        critical_threshold: 1.0,
        reference_range: "0-0.04",
    },
];

/// How far a result deviates from the normal range.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResultClass {
    /// Within the normal range.
    Normal,
    /// Outside the normal range, not critical.
    Abnormal,
    /// Beyond the critical threshold.
    Critical,
}

impl ResultClass {
    /// All classes, in the order of [`ResultClass::WEIGHTS`].
    pub const ALL: [ResultClass; 3] = [
        ResultClass::Normal,
        ResultClass::Abnormal,
        ResultClass::Critical,
    ];

    /// Relative frequency of each class.
    pub const WEIGHTS: [f64; 3] = [0.80, 0.15, 0.05];
}

/// The flag of a result outside the normal range.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AbnormalFlag {
    /// Above the normal range.
    High,
    /// Below the normal range.
    Low,
    /// Beyond the critical threshold.
    Critical,
}

impl AbnormalFlag {
    /// The upper-case name stored in the warehouse.
    pub fn as_str(self) -> &'static str {
        match self {
            AbnormalFlag::High => "HIGH",
            AbnormalFlag::Low => "LOW",
            AbnormalFlag::Critical => "CRITICAL",
        }
    }
}

/// A drawn result value and its flag.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LabValue {
    /// The value, rounded to two decimals.
    pub value: f64,
    /// `None` for normal results.
    pub flag: Option<AbnormalFlag>,
}
