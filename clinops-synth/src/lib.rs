//! Seeded generation of synthetic clinical records.
//!
//! The [`SyntheticGenerator`] produces patients, their encounters and the lab results of those
//! encounters, in that order, with statistically shaped fan-out: Poisson-distributed encounter and
//! lab counts, weighted encounter types and result classes, and dates that respect the clinical
//! timeline. A seed and an `as_of` instant fully determine the output.
//!
//! Generated data can be written to CSV with [`export::save_csv`] and loaded into the raw CDC
//! tables of the warehouse with [`load::load_generated`].
//!
//! ```
//! use chrono::NaiveDate;
//! use clinops_synth::SyntheticGenerator;
//!
//! let as_of = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
//! let mut generator = SyntheticGenerator::builder()
//!     .patients(10)
//!     .as_of(as_of)
//!     .build()
//!     .unwrap();
//!
//! let summary = generator.generate_all().unwrap();
//! assert_eq!(summary.patients, 10);
//! ```
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod catalog;
mod demographics;
mod error;
pub mod export;
mod generator;
mod ids;
pub mod load;
pub mod model;

pub use error::{GenerateError, GenerateResult, Phase};
pub use generator::{GeneratorBuilder, Summary, SyntheticGenerator};
