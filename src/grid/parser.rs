//! Grid document parsing.
//!
//! Accepts a 2D array of rows, a flat cell list (reshaped by `ncols`), or
//! an object with a `grid` key and an optional embedded `header`.

use super::{Grid, GridHeader, GridLayout};
use crate::error::GfaError;
use crate::models::{Cell, TypeCode};
use serde_json::{Map, Value};
use tracing::debug;

/// Parse and validate a grid document.
pub fn parse_grid(document: &Value, layout: &GridLayout) -> Result<Grid, GfaError> {
    let (cells, layout) = match document {
        Value::Object(obj) => {
            let cells = obj.get("grid").ok_or_else(|| {
                GfaError::MalformedGrid("missing required key `grid`".to_string())
            })?;
            let layout = match obj.get("header") {
                Some(header) => {
                    let header: GridHeader = serde_json::from_value(header.clone())
                        .map_err(|e| GfaError::MalformedGrid(format!("invalid header: {}", e)))?;
                    layout.with_header(&header)
                }
                None => layout.clone(),
            };
            (cells, layout)
        }
        Value::Array(_) => (document, layout.clone()),
        other => {
            return Err(GfaError::MalformedGrid(format!(
                "expected a JSON array or object, found {}",
                json_kind(other)
            )))
        }
    };

    let items = cells
        .as_array()
        .ok_or_else(|| GfaError::MalformedGrid("`grid` must be an array".to_string()))?;

    let raw_rows = shape_rows(items, &layout)?;
    check_dimensions(&raw_rows, &layout)?;

    let decoder = CellDecoder::new(&layout)?;
    let mut rows = Vec::with_capacity(raw_rows.len());
    for (r, raw_row) in raw_rows.iter().enumerate() {
        let row = raw_row
            .iter()
            .enumerate()
            .map(|(c, value)| decoder.decode(value, r, c))
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(row);
    }

    // Hash the rows as read so that a reshaped flat list hashes differently.
    let canonical = serde_json::to_vec(&raw_rows)?;
    let grid = Grid::new(rows, canonical);
    debug!(
        "Parsed grid: {} rows x {} columns",
        grid.height(),
        grid.width()
    );
    Ok(grid)
}

/// An array that holds an array or an object can only be a row of
/// array-encoded cells.
fn holds_cells(value: &Value) -> bool {
    match value {
        Value::Array(items) => items
            .iter()
            .any(|v| matches!(v, Value::Object(_) | Value::Array(_))),
        _ => false,
    }
}

/// Split the top-level items into rows.
///
/// Without a `block`, every top-level array is a row. With a `block`,
/// scalar-only arrays are array-encoded cells unless some top-level array
/// holds cells itself.
fn shape_rows<'a>(items: &'a [Value], layout: &GridLayout) -> Result<Vec<Vec<&'a Value>>, GfaError> {
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let nested = if layout.block.is_empty() {
        items.iter().any(Value::is_array)
    } else {
        items.iter().any(holds_cells)
    };

    if nested {
        return items
            .iter()
            .enumerate()
            .map(|(r, item)| match item {
                Value::Array(row) => Ok(row.iter().collect()),
                other => Err(GfaError::MalformedGrid(format!(
                    "grid mixes rows and bare cells: item {} is {}",
                    r,
                    json_kind(other)
                ))),
            })
            .collect();
    }

    // Flat cell list.
    match layout.ncols {
        Some(0) => Err(GfaError::MalformedGrid(
            "column count must be at least 1".to_string(),
        )),
        Some(ncols) if items.len() % ncols != 0 => Err(GfaError::MalformedGrid(format!(
            "{} cells cannot be split into rows of {}",
            items.len(),
            ncols
        ))),
        Some(ncols) => Ok(items.chunks(ncols).map(|c| c.iter().collect()).collect()),
        None => Ok(vec![items.iter().collect()]),
    }
}

fn check_dimensions(rows: &[Vec<&Value>], layout: &GridLayout) -> Result<(), GfaError> {
    let width = rows.first().map_or(0, Vec::len);

    for (i, row) in rows.iter().enumerate() {
        if row.len() != width {
            return Err(GfaError::MalformedGrid(format!(
                "row {} has {} cells, expected {}",
                i,
                row.len(),
                width
            )));
        }
    }

    if let Some(nrows) = layout.nrows {
        if rows.len() != nrows {
            return Err(GfaError::MalformedGrid(format!(
                "grid has {} rows, header declares {}",
                rows.len(),
                nrows
            )));
        }
    }

    if let Some(ncols) = layout.ncols {
        if !rows.is_empty() && width != ncols {
            return Err(GfaError::MalformedGrid(format!(
                "grid has {} columns, header declares {}",
                width, ncols
            )));
        }
    }

    Ok(())
}

struct CellDecoder<'a> {
    layout: &'a GridLayout,
    type_index: Option<usize>,
    units_index: Option<usize>,
}

impl<'a> CellDecoder<'a> {
    fn new(layout: &'a GridLayout) -> Result<Self, GfaError> {
        let position = |key: &str| layout.block.iter().position(|f| f == key);
        let type_index = position(layout.type_key.as_str());

        if !layout.block.is_empty() && type_index.is_none() {
            return Err(GfaError::MalformedGrid(format!(
                "`block` has no `{}` field",
                layout.type_key
            )));
        }

        Ok(Self {
            layout,
            type_index,
            units_index: position(layout.units_key.as_str()).filter(|_| layout.count_units),
        })
    }

    fn decode(&self, value: &Value, row: usize, col: usize) -> Result<Option<Cell>, GfaError> {
        match value {
            Value::Null => Ok(None),
            Value::Object(obj) => self.decode_object(obj, row, col).map(Some),
            Value::Array(fields) => self.decode_positional(fields, row, col).map(Some),
            other => Err(GfaError::schema(
                row,
                col,
                format!("expected a cell object, array or null, found {}", json_kind(other)),
            )),
        }
    }

    fn decode_object(&self, obj: &Map<String, Value>, row: usize, col: usize) -> Result<Cell, GfaError> {
        let key = &self.layout.type_key;
        let raw = obj
            .get(key)
            .ok_or_else(|| GfaError::schema(row, col, format!("missing field `{}`", key)))?;
        let code = type_code(raw, key, row, col)?;
        let units = match obj
            .get(&self.layout.units_key)
            .filter(|_| self.layout.count_units)
        {
            Some(v) => parse_units(v, &self.layout.units_key, row, col)?,
            None => None,
        };
        Ok(Cell { code, units })
    }

    fn decode_positional(&self, fields: &[Value], row: usize, col: usize) -> Result<Cell, GfaError> {
        let type_index = self.type_index.ok_or_else(|| {
            GfaError::MalformedGrid("array-encoded cells need a `block` field list".to_string())
        })?;
        let key = &self.layout.type_key;
        let raw = fields
            .get(type_index)
            .ok_or_else(|| GfaError::schema(row, col, format!("missing field `{}`", key)))?;
        let code = type_code(raw, key, row, col)?;
        let units = match self.units_index.and_then(|i| fields.get(i)) {
            Some(v) => parse_units(v, &self.layout.units_key, row, col)?,
            None => None,
        };
        Ok(Cell { code, units })
    }
}

fn type_code(value: &Value, key: &str, row: usize, col: usize) -> Result<TypeCode, GfaError> {
    TypeCode::from_json(value).ok_or_else(|| {
        GfaError::schema(
            row,
            col,
            format!("`{}` must be a number or string, found {}", key, json_kind(value)),
        )
    })
}

fn parse_units(value: &Value, key: &str, row: usize, col: usize) -> Result<Option<u64>, GfaError> {
    if value.is_null() {
        return Ok(None);
    }
    if let Some(n) = value.as_u64() {
        return Ok(Some(n));
    }
    match value.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(Some(f as u64)),
        _ => Err(GfaError::schema(
            row,
            col,
            format!("`{}` must be a non-negative integer", key),
        )),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
