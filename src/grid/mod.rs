//! Grid snapshots.
//!
//! This module turns a fetched CityIO grid document into a validated,
//! rectangular [`Grid`] and computes its content hash.

pub mod header;
pub mod parser;

pub use header::GridHeader;
pub use parser::parse_grid;

use crate::models::Cell;
use sha2::{Digest, Sha256};

/// How cells are read from a grid document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridLayout {
    /// Field holding the type code.
    pub type_key: String,
    /// Field holding the unit count (height or floors).
    pub units_key: String,
    /// Column count used to reshape a flat cell list.
    pub ncols: Option<usize>,
    /// Expected row count, if declared.
    pub nrows: Option<usize>,
    /// Positional field names for array-encoded cells.
    pub block: Vec<String>,
    /// Read `units_key` from cells. Off when rules already carry the floor
    /// count.
    pub count_units: bool,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            type_key: "type".to_string(),
            units_key: "height".to_string(),
            ncols: None,
            nrows: None,
            block: Vec::new(),
            count_units: true,
        }
    }
}

impl From<&crate::config::GridConfig> for GridLayout {
    fn from(config: &crate::config::GridConfig) -> Self {
        Self {
            type_key: config.type_key.clone(),
            units_key: config.units_key.clone(),
            ncols: config.ncols,
            nrows: config.nrows,
            block: Vec::new(),
            count_units: true,
        }
    }
}

impl GridLayout {
    /// Overlay the values a header declares. Header values win.
    pub fn with_header(&self, header: &GridHeader) -> Self {
        let mut layout = self.clone();
        if header.spatial.ncols.is_some() {
            layout.ncols = header.spatial.ncols;
        }
        if header.spatial.nrows.is_some() {
            layout.nrows = header.spatial.nrows;
        }
        if !header.block.is_empty() {
            layout.block = header.block.clone();
        }
        layout
    }

    /// The same layout with per-cell units ignored, so every cell counts
    /// as one unit.
    pub fn without_units(mut self) -> Self {
        self.count_units = false;
        self
    }

    /// Layout for a CityIO table. Rules derived from the header already
    /// multiply by `bld_numLevels`, so cell heights are not read.
    pub fn for_cityio(&self, header: &GridHeader) -> Self {
        self.with_header(header).without_units()
    }
}

/// A validated, rectangular, row-major grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    rows: Vec<Vec<Option<Cell>>>,
    canonical: Vec<u8>,
}

impl Grid {
    pub(crate) fn new(rows: Vec<Vec<Option<Cell>>>, canonical: Vec<u8>) -> Self {
        Self { rows, canonical }
    }

    #[allow(dead_code)] // Row-level access for inspection
    pub fn rows(&self) -> &[Vec<Option<Cell>>] {
        &self.rows
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns (0 for an empty grid).
    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    pub fn cell_count(&self) -> usize {
        self.height() * self.width()
    }

    /// Every cell, row-major. `None` marks an empty cell.
    pub fn cells(&self) -> impl Iterator<Item = Option<&Cell>> {
        self.rows.iter().flat_map(|row| row.iter().map(Option::as_ref))
    }

    /// Canonical serialization of the cell rows as read: compact JSON with
    /// sorted object keys.
    pub fn canonical_bytes(&self) -> &[u8] {
        &self.canonical
    }

    /// Lowercase hex SHA-256 of the canonical serialization.
    pub fn content_hash(&self) -> String {
        sha256_hex(self.canonical_bytes())
    }
}

/// Hex-encode the SHA-256 digest of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
