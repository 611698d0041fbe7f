//! # regrad-data
//!
//! Loads regression inputs from delimited text files. Columns are selected by
//! header name and returned as shared `f64` vectors ready to bind to graph
//! data leaves.

pub mod csv;

pub use csv::{parse_columns, read_columns, ColumnSpec, Columns};
