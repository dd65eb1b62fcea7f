//! Error types for fetching and aggregating grids.

use thiserror::Error;

/// Errors surfaced by the fetcher, the grid parser and the rule loader.
///
/// An unmapped type code is not an error: the aggregator skips such cells.
#[derive(Debug, Error)]
pub enum GfaError {
    /// The endpoint could not be reached or answered with a non-success status.
    #[error("network error: {0}")]
    Network(String),

    /// The body was not valid JSON.
    #[error("parse error: {0}")]
    Parse(String),

    /// The grid is not rectangular, its declared shape does not match, or a
    /// required key is missing.
    #[error("malformed grid: {0}")]
    MalformedGrid(String),

    /// A cell has no type code field, or a field has the wrong JSON type.
    #[error("schema error at row {row}, column {col}: {reason}")]
    Schema {
        row: usize,
        col: usize,
        reason: String,
    },

    /// Rule table or target configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl GfaError {
    pub(crate) fn schema(row: usize, col: usize, reason: impl Into<String>) -> Self {
        GfaError::Schema {
            row,
            col,
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for GfaError {
    fn from(e: serde_json::Error) -> Self {
        GfaError::Parse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_message() {
        let err = GfaError::schema(2, 5, "missing field `type`");
        assert_eq!(
            err.to_string(),
            "schema error at row 2, column 5: missing field `type`"
        );
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: GfaError = json_err.into();
        assert!(matches!(err, GfaError::Parse(_)));
    }
}
