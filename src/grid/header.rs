//! CityIO table header.
//!
//! The header describes the grid's geometry (`spatial`), the positional
//! field layout of array-encoded cells (`block`) and the list of type
//! definitions that type codes index into (`mapping.type`).

use serde::Deserialize;
use serde_json::Value;

/// Parsed CityIO header. Every section is optional so that partial headers
/// embedded in grid documents can be read with the same type.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GridHeader {
    #[serde(default)]
    pub spatial: Spatial,

    /// Field names of array-encoded cells, e.g. `["type", "rotation"]`.
    #[serde(default)]
    pub block: Vec<String>,

    #[serde(default)]
    pub mapping: Mapping,
}

/// Grid geometry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Spatial {
    /// Edge length of one cell in metres.
    #[serde(rename = "cellSize", default)]
    pub cell_size: Option<f64>,
    #[serde(default)]
    pub ncols: Option<usize>,
    #[serde(default)]
    pub nrows: Option<usize>,
}

/// Type definitions, indexed by type code.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Mapping {
    #[serde(rename = "type", default)]
    pub types: Vec<Value>,
}
