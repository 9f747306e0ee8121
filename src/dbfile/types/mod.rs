//! Foundational data structures, error types, schema and output values.

pub mod error;
pub mod models;
pub mod schema;
pub mod value;
