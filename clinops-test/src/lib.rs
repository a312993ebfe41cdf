//! Test utilities for the clinical operations tools.
//!
//! This crate provides utilities to facilitate testing against a scripted warehouse. See the
//! modules for all available utilities.

pub mod fixtures;
pub mod tracing;
