//! GFA aggregation over a grid.
//!
//! One pass over every cell: classify by type code, accumulate
//! `multiplier × units` per category, then attach the targets and the grid
//! hash. Cells that are empty or carry an unmapped code contribute nothing.

use crate::grid::Grid;
use crate::models::{AggregationStats, CategoryTotals, ExpectedTargets, GfaSummary};
use crate::rules::RuleTable;
use tracing::debug;

/// Aggregate `grid` into category totals.
pub fn compute_totals(grid: &Grid, rules: &RuleTable, expected: &ExpectedTargets) -> GfaSummary {
    let mut totals = CategoryTotals::default();
    let mut stats = AggregationStats::default();

    for cell in grid.cells() {
        let Some(cell) = cell else {
            stats.empty_cells += 1;
            continue;
        };

        let Some(rule) = rules.get(&cell.code) else {
            debug!("No rule for type code '{}'", cell.code);
            stats.unmapped_cells += 1;
            continue;
        };

        stats.mapped_cells += 1;
        let units = cell.unit_count();
        for share in &rule.shares {
            totals.add(share.category, share.multiplier.saturating_mul(units));
        }
    }

    GfaSummary {
        totals,
        expected: expected.clone(),
        grid_hash: grid.content_hash(),
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{parse_grid, sha256_hex, GridLayout};
    use crate::models::{Category, TypeCode};
    use serde_json::{json, Value};

    fn grid(doc: Value) -> Grid {
        parse_grid(&doc, &GridLayout::default()).unwrap()
    }

    fn small_rules() -> RuleTable {
        let mut rules = RuleTable::new();
        rules.add_share(TypeCode::from("house"), Category::Living, 100);
        rules.add_share(TypeCode::from("shop"), Category::Commerce, 50);
        rules.add_share(TypeCode::from("mixed"), Category::Commerce, 10);
        rules.add_share(TypeCode::from("mixed"), Category::Living, 30);
        rules.add_share(TypeCode::from("park"), Category::Green, 7);
        rules
    }

    #[test]
    fn test_single_commercial_cell_matches_sample() {
        let summary = compute_totals(
            &grid(json!([[{"type": "commercial"}]])),
            &RuleTable::builtin(),
            &ExpectedTargets::default(),
        );

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains(r#""commerce":1888768"#));
        assert!(json.contains(r#""commerce_expected":550000"#));
        assert_eq!(summary.totals.get(Category::Living), 0);
    }

    #[test]
    fn test_units_multiply_area() {
        let summary = compute_totals(
            &grid(json!([
                [{"type": "house", "height": 3}, {"type": "shop"}],
                [{"type": "mixed", "height": 2}, {"type": "park", "height": 0}]
            ])),
            &small_rules(),
            &ExpectedTargets::default(),
        );

        assert_eq!(summary.totals.get(Category::Living), 300 + 60);
        assert_eq!(summary.totals.get(Category::Commerce), 50 + 20);
        assert_eq!(summary.totals.get(Category::Green), 0);
        assert_eq!(summary.stats.mapped_cells, 4);
    }

    #[test]
    fn test_unmapped_and_empty_cells_contribute_zero() {
        let rules = small_rules();
        let with_unknown = compute_totals(
            &grid(json!([
                [{"type": "house"}, {"type": "parking", "height": 9}],
                [null, {"type": 42}]
            ])),
            &rules,
            &ExpectedTargets::default(),
        );

        assert_eq!(with_unknown.totals.sum(), 100);
        assert_eq!(with_unknown.stats.unmapped_cells, 2);
        assert_eq!(with_unknown.stats.empty_cells, 1);
        assert_eq!(with_unknown.stats.total_cells(), 4);
    }

    #[test]
    fn test_sum_equals_recognized_area() {
        let cells = [
            ("house", 2u64),
            ("shop", 1),
            ("mixed", 4),
            ("park", 5),
            ("unknown", 8),
        ];
        let row: Vec<Value> = cells
            .iter()
            .map(|(code, units)| json!({"type": code, "height": units}))
            .collect();

        let rules = small_rules();
        let summary = compute_totals(&grid(json!([row])), &rules, &ExpectedTargets::default());

        let expected_sum: u64 = cells
            .iter()
            .filter_map(|(code, units)| {
                rules.get(&TypeCode::from(*code)).map(|rule| {
                    rule.shares
                        .iter()
                        .map(|s| s.multiplier * units)
                        .sum::<u64>()
                })
            })
            .sum();

        assert_eq!(summary.totals.sum(), expected_sum);
        assert_eq!(expected_sum, 200 + 50 + 160 + 35);
    }

    #[test]
    fn test_deterministic_and_idempotent() {
        let raw = r#"[[{"type":"house","height":2},{"type":"shop"}],[null,{"type":"park"}]]"#;
        let rules = small_rules();
        let expected = ExpectedTargets::default();

        let first = compute_totals(&grid(serde_json::from_str(raw).unwrap()), &rules, &expected);
        let second = compute_totals(&grid(serde_json::from_str(raw).unwrap()), &rules, &expected);

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_hash_tracks_content() {
        let rules = small_rules();
        let expected = ExpectedTargets::default();

        let a = compute_totals(&grid(json!([[{"type": "house"}]])), &rules, &expected);
        let reserialized = compute_totals(
            &grid(serde_json::from_str("[ [ {\"type\" : \"house\"} ] ]").unwrap()),
            &rules,
            &expected,
        );
        let b = compute_totals(&grid(json!([[{"type": "shop"}]])), &rules, &expected);

        assert_eq!(a.grid_hash, reserialized.grid_hash);
        assert_ne!(a.grid_hash, b.grid_hash);
        assert_eq!(a.grid_hash.len(), 64);
    }

    #[test]
    fn test_hash_differs_for_same_totals() {
        let rules = small_rules();
        let expected = ExpectedTargets::default();

        let a = compute_totals(&grid(json!([[{"type": "house"}, null]])), &rules, &expected);
        let b = compute_totals(&grid(json!([[null, {"type": "house"}]])), &rules, &expected);

        assert_eq!(a.totals, b.totals);
        assert_ne!(a.grid_hash, b.grid_hash);
    }

    #[test]
    fn test_empty_grid() {
        let summary = compute_totals(
            &grid(json!([])),
            &RuleTable::builtin(),
            &ExpectedTargets::default(),
        );

        for category in Category::ALL {
            assert_eq!(summary.totals.get(category), 0);
        }
        assert_eq!(summary.grid_hash, sha256_hex(b"[]"));
    }

    #[test]
    fn test_expected_keys_independent_of_input() {
        let rules = RuleTable::builtin();
        let expected = ExpectedTargets::default();

        let empty: Value =
            serde_json::to_value(compute_totals(&grid(json!([])), &rules, &expected)).unwrap();
        let full: Value = serde_json::to_value(compute_totals(
            &grid(json!([[{"type": "living", "height": 12}, {"type": "park"}]])),
            &rules,
            &expected,
        ))
        .unwrap();

        for category in Category::ALL {
            let key = category.expected_key();
            assert!(empty.get(&key).is_some(), "missing {}", key);
            assert_eq!(empty[&key], full[&key]);
            assert!(full.get(category.key()).is_some());
        }
        assert!(full["grid_hash"].is_string());
    }

    #[test]
    fn test_cityio_grid_with_derived_rules() {
        use crate::grid::GridHeader;
        use crate::rules::{derive_rules, TypeDefs};

        let header: GridHeader = serde_json::from_value(json!({
            "spatial": {"cellSize": 10, "ncols": 2, "nrows": 1},
            "block": ["type", "rotation"],
            "mapping": {"type": [
                {"type": "building", "bld_useGround": "shop", "bld_useUpper": "flat", "bld_numLevels": 3},
                {"type": "open_space", "os_type": "lawn"}
            ]}
        }))
        .unwrap();
        let typedefs: TypeDefs = serde_json::from_value(json!({
            "buildinguses": {"living": ["flat"], "commerce": ["shop"]},
            "openspacetypes": {"green": ["lawn"]}
        }))
        .unwrap();

        let rules = derive_rules(&header, &typedefs).unwrap();
        let layout = GridLayout::default().for_cityio(&header);
        let grid = parse_grid(&json!([[0, 0], [1, 90]]), &layout).unwrap();

        let summary = compute_totals(&grid, &rules, &ExpectedTargets::default());
        assert_eq!(summary.totals.get(Category::Commerce), 100);
        assert_eq!(summary.totals.get(Category::Living), 200);
        assert_eq!(summary.totals.get(Category::Green), 100);
    }

    #[test]
    fn test_cityio_height_not_counted_twice() {
        use crate::grid::GridHeader;
        use crate::rules::{derive_rules, TypeDefs};

        let header: GridHeader = serde_json::from_value(json!({
            "spatial": {"cellSize": 10, "ncols": 1, "nrows": 1},
            "block": ["type", "height"],
            "mapping": {"type": [
                {"type": "building", "bld_useGround": "flat", "bld_useUpper": "flat", "bld_numLevels": 3}
            ]}
        }))
        .unwrap();
        let typedefs: TypeDefs = serde_json::from_value(json!({
            "buildinguses": {"living": ["flat"]}
        }))
        .unwrap();

        let rules = derive_rules(&header, &typedefs).unwrap();
        let layout = GridLayout::default().for_cityio(&header);
        let grid = parse_grid(&json!([[0, 3]]), &layout).unwrap();

        let summary = compute_totals(&grid, &rules, &ExpectedTargets::default());
        assert_eq!(summary.totals.get(Category::Living), 300);
    }
}
