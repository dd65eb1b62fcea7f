//! Summary output.

pub mod generator;

pub use generator::{generate_comparison_table, generate_json_report, write_report};
