//! Rules derived from a CityIO table header.
//!
//! Each entry of `mapping.type` describes one type code (its index). A
//! `building` entry contributes one floor plate (`cellSize²`) for its ground
//! use and `levels - 1` plates for its upper use. An `open_space` entry
//! contributes one plate for its open space type. Uses are mapped to
//! categories through a typedefs file.

use super::RuleTable;
use crate::error::GfaError;
use crate::grid::GridHeader;
use crate::models::{Category, TypeCode};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// Category membership of building uses and open space types.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TypeDefs {
    #[serde(rename = "buildinguses", default)]
    pub building_uses: BuildingUses,

    #[serde(rename = "openspacetypes", default)]
    pub open_space_types: OpenSpaceTypes,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildingUses {
    #[serde(default)]
    pub living: Vec<String>,
    #[serde(default)]
    pub commerce: Vec<String>,
    #[serde(default)]
    pub special: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenSpaceTypes {
    #[serde(default)]
    pub green: Vec<String>,
    #[serde(default)]
    pub sports: Vec<String>,
    #[serde(default)]
    pub playgrounds: Vec<String>,
}

impl TypeDefs {
    /// Load typedefs from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read typedefs file: {}", path.display()))?;

        let typedefs: TypeDefs = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse typedefs file: {}", path.display()))?;

        Ok(typedefs)
    }

    /// Categories a building use belongs to.
    pub fn building_categories(&self, use_name: &str) -> Vec<Category> {
        let uses = &self.building_uses;
        [
            (Category::Living, &uses.living),
            (Category::Commerce, &uses.commerce),
            (Category::Special, &uses.special),
        ]
        .into_iter()
        .filter(|(_, names)| names.iter().any(|n| n == use_name))
        .map(|(category, _)| category)
        .collect()
    }

    /// Categories an open space type belongs to.
    pub fn open_space_categories(&self, os_type: &str) -> Vec<Category> {
        let types = &self.open_space_types;
        [
            (Category::Green, &types.green),
            (Category::Sports, &types.sports),
            (Category::Playgrounds, &types.playgrounds),
        ]
        .into_iter()
        .filter(|(_, names)| names.iter().any(|n| n == os_type))
        .map(|(category, _)| category)
        .collect()
    }
}

/// Build a rule table from a header's type mapping.
pub fn derive_rules(header: &GridHeader, typedefs: &TypeDefs) -> Result<RuleTable, GfaError> {
    let cell_size = header.spatial.cell_size.ok_or_else(|| {
        GfaError::MalformedGrid("header is missing `spatial.cellSize`".to_string())
    })?;
    if !cell_size.is_finite() || cell_size < 0.0 {
        return Err(GfaError::MalformedGrid(format!(
            "invalid cell size {}",
            cell_size
        )));
    }
    let plate = (cell_size * cell_size).round() as u64;

    let mut table = RuleTable::new();
    for (index, entry) in header.mapping.types.iter().enumerate() {
        let code = TypeCode::from(index);
        match entry.get("type").and_then(Value::as_str) {
            Some("building") => add_building(&mut table, &code, entry, plate, typedefs),
            Some("open_space") => {
                if let Some(os_type) = non_empty_str(entry, "os_type") {
                    for category in typedefs.open_space_categories(os_type) {
                        table.add_share(code.clone(), category, plate);
                    }
                }
            }
            Some(other) => debug!("Type {} has unhandled kind '{}'", index, other),
            None => debug!("Type {} has no kind, treated as empty", index),
        }
    }

    debug!(
        "Derived {} rules from {} header types",
        table.len(),
        header.mapping.types.len()
    );
    Ok(table)
}

fn add_building(table: &mut RuleTable, code: &TypeCode, entry: &Value, plate: u64, typedefs: &TypeDefs) {
    let levels = levels(entry);

    if levels > 0 {
        if let Some(ground) = non_empty_str(entry, "bld_useGround") {
            for category in typedefs.building_categories(ground) {
                table.add_share(code.clone(), category, plate);
            }
        }
    }

    if levels > 1 {
        if let Some(upper) = non_empty_str(entry, "bld_useUpper") {
            let area = plate.saturating_mul(levels - 1);
            for category in typedefs.building_categories(upper) {
                table.add_share(code.clone(), category, area);
            }
        }
    }
}

fn levels(entry: &Value) -> u64 {
    match entry.get("bld_numLevels") {
        Some(v) => v
            .as_u64()
            .or_else(|| v.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        None => 0,
    }
}

fn non_empty_str<'a>(entry: &'a Value, key: &str) -> Option<&'a str> {
    entry
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}
