//! Analysis modules.
//!
//! This module holds the aggregation pass that turns a grid into totals.

pub mod aggregator;

pub use aggregator::*;
