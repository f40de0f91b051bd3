//! Core contracts for clinplan.
//!
//! This crate defines the tabular input model and the dataset schema that every
//! planning stage reads by reference.

pub mod error;
pub mod infer;
pub mod schema;
pub mod table;

pub use error::{Error, Result};
pub use infer::{DISTINCT_VALUE_LIMIT, infer_kind, infer_schema};
pub use schema::{DatasetSchema, Variable, VariableKind};
pub use table::{CellValue, Table};
