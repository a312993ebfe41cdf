//! The warehouse layer is the single seam between the clinical operations tools and the cloud
//! data warehouse they measure.
//!
//! Everything the tools need from the warehouse is expressed through the [`Warehouse`] trait:
//! execute a parameterized statement and get back an ordered [`ResultSet`], and close the session
//! when done. Rows arrive as loosely-typed strings and are decoded exactly once, at this boundary,
//! into typed records via [`FromRow`].
//!
//! Two implementations are provided:
//!
//! - [`SqlApiWarehouse`] talks to the warehouse SQL REST API.
//! - [`InMemoryWarehouse`] is a scripted stand-in for tests and dry runs.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod config;
mod error;
mod in_memory;
mod result_set;
mod sql_api;
mod warehouse;

pub use config::{Compute, ConfigSecret, TokenType, WarehouseConfig};
pub use error::{WarehouseError, WarehouseResult};
pub use in_memory::{Executed, InMemoryWarehouse};
pub use result_set::{Column, FromRow, ResultSet, Row};
pub use sql_api::SqlApiWarehouse;
pub use warehouse::{Param, SharedWarehouse, Warehouse};
