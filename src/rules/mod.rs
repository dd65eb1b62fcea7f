//! Cell type rule tables.
//!
//! A [`RuleTable`] maps type codes to the categories and per-unit areas
//! they contribute. Tables come from the built-in defaults, from the
//! `[rules]` config section, or from a CityIO header (see [`cityio`]).

pub mod cityio;

pub use cityio::{derive_rules, TypeDefs};

use crate::config::RulesConfig;
use crate::error::GfaError;
use crate::models::{Category, CellTypeRule, GfaShare, TypeCode};
use std::collections::HashMap;

/// Per-unit area of every built-in type.
pub const BUILTIN_MULTIPLIER: u64 = 1_888_768;

/// Built-in type codes and their categories.
const BUILTIN_TYPES: [(&str, Category); 6] = [
    ("living", Category::Living),
    ("commercial", Category::Commerce),
    ("special", Category::Special),
    ("park", Category::Green),
    ("sports", Category::Sports),
    ("playground", Category::Playgrounds),
];

/// Immutable lookup from type code to rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleTable {
    rules: HashMap<TypeCode, CellTypeRule>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The default table: one code per category.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for (code, category) in BUILTIN_TYPES {
            table.add_share(TypeCode::from(code), category, BUILTIN_MULTIPLIER);
        }
        table
    }

    /// Build the table from config entries, falling back to the built-in
    /// table when none are given. Repeated codes add further shares.
    pub fn from_config(config: &RulesConfig) -> Result<Self, GfaError> {
        if config.types.is_empty() {
            return Ok(Self::builtin());
        }

        let mut table = Self::new();
        for entry in &config.types {
            let category: Category = entry.category.parse().map_err(|e| {
                GfaError::Config(format!("rule for type '{}': {}", entry.code, e))
            })?;
            table.add_share(TypeCode::from(entry.code.as_str()), category, entry.multiplier);
        }
        Ok(table)
    }

    /// Add a share to `code`'s rule. Shares of the same category merge.
    pub fn add_share(&mut self, code: TypeCode, category: Category, multiplier: u64) {
        let rule = self
            .rules
            .entry(code)
            .or_insert_with(|| CellTypeRule { shares: Vec::new() });

        match rule.shares.iter_mut().find(|s| s.category == category) {
            Some(share) => share.multiplier = share.multiplier.saturating_add(multiplier),
            None => rule.shares.push(GfaShare {
                category,
                multiplier,
            }),
        }
    }

    pub fn get(&self, code: &TypeCode) -> Option<&CellTypeRule> {
        self.rules.get(code)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
