//! Summary emission.
//!
//! This module renders a [`GfaSummary`] as the flat JSON object consumed
//! downstream and as a short human-readable comparison against targets.

use crate::models::{Category, GfaSummary};
use anyhow::{Context, Result};
use std::path::Path;

/// Render the summary as a flat JSON object.
pub fn generate_json_report(summary: &GfaSummary, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(summary)?
    } else {
        serde_json::to_string(summary)?
    };
    Ok(json)
}

/// Write rendered output to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write summary to {}", path.display()))
}

/// Render a table of totals against targets.
pub fn generate_comparison_table(summary: &GfaSummary) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "{:<12} {:>14} {:>14} {:>8}\n",
        "category", "total", "expected", "ratio"
    ));

    for category in Category::ALL {
        let total = summary.totals.get(category);
        let expected = summary.expected.get(category);
        output.push_str(&format!(
            "{:<12} {:>14} {:>14} {:>8}\n",
            category.key(),
            total,
            expected,
            format_ratio(total, expected)
        ));
    }

    output.push_str(&format!("grid_hash    {}\n", summary.grid_hash));
    output
}

fn format_ratio(total: u64, expected: u64) -> String {
    if expected == 0 {
        return "-".to_string();
    }
    format!("{:.0}%", total as f64 / expected as f64 * 100.0)
}
