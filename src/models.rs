//! Data models for the GFA aggregator.
//!
//! This module contains the core data structures used throughout
//! the application for representing grids, rules, and summaries.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Output category of a grid cell.
///
/// Declaration order is alphabetical and drives the key order of the
/// emitted summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Shops, offices and other commercial floor area
    Commerce,
    /// Parks and other green open space
    Green,
    /// Residential floor area
    Living,
    /// Playground open space
    Playgrounds,
    /// Schools, culture and other special-use buildings
    Special,
    /// Sports grounds
    Sports,
}

impl Category {
    /// All categories, in emission order.
    pub const ALL: [Category; 6] = [
        Category::Commerce,
        Category::Green,
        Category::Living,
        Category::Playgrounds,
        Category::Special,
        Category::Sports,
    ];

    /// Key used for this category in the emitted summary.
    pub fn key(&self) -> &'static str {
        match self {
            Category::Commerce => "commerce",
            Category::Green => "green",
            Category::Living => "living",
            Category::Playgrounds => "playgrounds",
            Category::Special => "special",
            Category::Sports => "sports",
        }
    }

    /// Key of the matching target in the emitted summary.
    pub fn expected_key(&self) -> String {
        format!("{}_expected", self.key())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "commerce" => Ok(Category::Commerce),
            "green" => Ok(Category::Green),
            "living" => Ok(Category::Living),
            "playgrounds" | "playground" => Ok(Category::Playgrounds),
            "special" => Ok(Category::Special),
            "sports" => Ok(Category::Sports),
            other => Err(format!("unknown category '{}'", other)),
        }
    }
}

/// A cell type code. Integer codes are stored in their decimal form so that
/// `3` and `"3"` name the same type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeCode(String);

impl TypeCode {
    /// Build a type code from a JSON scalar. Integral floats such as `3.0`
    /// take their integer form. Returns `None` for arrays, objects, booleans
    /// and `null`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(TypeCode(s.clone())),
            serde_json::Value::Number(n) if n.is_f64() => {
                let f = n.as_f64()?;
                if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    Some(TypeCode((f as i64).to_string()))
                } else {
                    Some(TypeCode(n.to_string()))
                }
            }
            serde_json::Value::Number(n) => Some(TypeCode(n.to_string())),
            _ => None,
        }
    }
}

impl From<&str> for TypeCode {
    fn from(s: &str) -> Self {
        TypeCode(s.to_string())
    }
}

impl From<usize> for TypeCode {
    fn from(i: usize) -> Self {
        TypeCode(i.to_string())
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A non-empty grid cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// Land-use type code.
    pub code: TypeCode,
    /// Height or floor count; `None` counts as one unit.
    pub units: Option<u64>,
}

impl Cell {
    #[allow(dead_code)] // Convenience constructor
    pub fn new(code: impl Into<TypeCode>, units: Option<u64>) -> Self {
        Self {
            code: code.into(),
            units,
        }
    }

    /// Unit count used for accumulation.
    pub fn unit_count(&self) -> u64 {
        self.units.unwrap_or(1)
    }
}

/// One (category, area-per-unit) contribution of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GfaShare {
    pub category: Category,
    pub multiplier: u64,
}

/// Classification of a single type code.
///
/// Most rules carry exactly one share. Mixed-use buildings carry one share
/// per use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellTypeRule {
    pub shares: Vec<GfaShare>,
}

impl CellTypeRule {
    /// A rule assigning all of a cell's area to one category.
    #[allow(dead_code)] // Convenience constructor
    pub fn single(category: Category, multiplier: u64) -> Self {
        Self {
            shares: vec![GfaShare {
                category,
                multiplier,
            }],
        }
    }
}

/// Accumulated GFA per category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTotals(BTreeMap<Category, u64>);

impl Default for CategoryTotals {
    fn default() -> Self {
        Self(Category::ALL.iter().map(|c| (*c, 0)).collect())
    }
}

impl CategoryTotals {
    /// Add `area` to `category`, saturating on overflow.
    pub fn add(&mut self, category: Category, area: u64) {
        let total = self.0.entry(category).or_insert(0);
        *total = total.saturating_add(area);
    }

    pub fn get(&self, category: Category) -> u64 {
        self.0.get(&category).copied().unwrap_or(0)
    }

    /// Sum over all categories.
    pub fn sum(&self) -> u64 {
        self.0.values().fold(0u64, |acc, v| acc.saturating_add(*v))
    }
}

/// Constant per-category targets, emitted as `<category>_expected`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedTargets {
    #[serde(default = "default_living_expected")]
    pub living: u64,
    #[serde(default = "default_commerce_expected")]
    pub commerce: u64,
    #[serde(default = "default_special_expected")]
    pub special: u64,
    #[serde(default = "default_green_expected")]
    pub green: u64,
    #[serde(default = "default_sports_expected")]
    pub sports: u64,
    #[serde(default = "default_playgrounds_expected")]
    pub playgrounds: u64,
}

impl Default for ExpectedTargets {
    fn default() -> Self {
        Self {
            living: default_living_expected(),
            commerce: default_commerce_expected(),
            special: default_special_expected(),
            green: default_green_expected(),
            sports: default_sports_expected(),
            playgrounds: default_playgrounds_expected(),
        }
    }
}

fn default_living_expected() -> u64 {
    400_000
}

fn default_commerce_expected() -> u64 {
    550_000
}

fn default_special_expected() -> u64 {
    30_000
}

fn default_green_expected() -> u64 {
    80_000
}

fn default_sports_expected() -> u64 {
    10_000
}

fn default_playgrounds_expected() -> u64 {
    10_000
}

impl ExpectedTargets {
    pub fn get(&self, category: Category) -> u64 {
        match category {
            Category::Commerce => self.commerce,
            Category::Green => self.green,
            Category::Living => self.living,
            Category::Playgrounds => self.playgrounds,
            Category::Special => self.special,
            Category::Sports => self.sports,
        }
    }
}

/// Diagnostics gathered during one aggregation pass. Not emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregationStats {
    /// Cells whose type code matched a rule.
    pub mapped_cells: usize,
    /// Cells with a type code that has no rule.
    pub unmapped_cells: usize,
    /// `null` cells.
    pub empty_cells: usize,
}

impl AggregationStats {
    pub fn total_cells(&self) -> usize {
        self.mapped_cells + self.unmapped_cells + self.empty_cells
    }
}

/// The result of one aggregation: totals, targets and the grid hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GfaSummary {
    pub totals: CategoryTotals,
    pub expected: ExpectedTargets,
    /// Lowercase hex SHA-256 of the canonical grid serialization.
    pub grid_hash: String,
    pub stats: AggregationStats,
}

impl Serialize for GfaSummary {
    /// Serializes as one flat object: `<category>` and `<category>_expected`
    /// for every category, then `grid_hash`.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Category::ALL.len() * 2 + 1))?;
        for category in Category::ALL {
            map.serialize_entry(category.key(), &self.totals.get(category))?;
            map.serialize_entry(&category.expected_key(), &self.expected.get(category))?;
        }
        map.serialize_entry("grid_hash", &self.grid_hash)?;
        map.end()
    }
}
