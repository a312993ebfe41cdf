//! Command line front end of the clinical operations toolkit.
//!
//! Ties the [`clinops_loadtest`] simulation, the [`clinops_synth`] generator and the warehouse
//! [`monitor`]s to a single `clinops` binary configured through [`config::Config`].

pub mod cli;
pub mod config;
pub mod generate;
pub mod monitor;
pub mod observability;
pub mod simulate;
