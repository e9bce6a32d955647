use super::table::{ClassifiedTable, Row, TableKind};
use super::{Category, NutrientMeasurement, Unit};
use crate::config::Config;
use crate::nutrients::Canonicalizer;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static UNIT_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*(ppm|%|mg/kg|mS/cm)").unwrap());
static FIRST_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d*\.\d+|\d+").unwrap());
static ANY_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\.?\d*").unwrap());
static NON_NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9.]+").unwrap());

/// Parse a current-value cell. Censored readings ("<0.5") and cells without
/// any digits both come out as 0.
pub fn parse_value(raw: &str) -> f64 {
    let cleaned = UNIT_TOKEN.replace_all(raw, "");
    if cleaned.contains('<') {
        return 0.0;
    }
    FIRST_NUMBER
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Strict "low - high" range. Anything that does not split into exactly two
/// numeric halves on '-' is not a range.
pub fn parse_range(raw: &str) -> Option<(f64, f64)> {
    if !raw.contains('-') {
        return None;
    }
    let parts: Vec<&str> = raw.split('-').collect();
    if parts.len() != 2 {
        return None;
    }
    let low = NON_NUMERIC.replace_all(parts[0], "").parse::<f64>().ok()?;
    let high = NON_NUMERIC.replace_all(parts[1], "").parse::<f64>().ok()?;
    Some((low, high))
}

/// Lenient ideal parse for header-less tables: two numbers give a range and
/// its midpoint, a lone number is the ideal itself.
pub fn parse_loose_ideal(raw: &str) -> (Option<f64>, Option<(f64, f64)>) {
    let nums: Vec<f64> = ANY_NUMBER
        .find_iter(raw)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();
    match nums.as_slice() {
        [low, high] => (Some(midpoint(*low, *high)), Some((*low, *high))),
        [single] => (Some(*single), None),
        _ => (None, None),
    }
}

pub fn midpoint(low: f64, high: f64) -> f64 {
    (low + high) / 2.0
}

/// Unit printed next to a value, if any. "%" is checked first.
pub fn unit_in_text(raw: &str) -> Option<Unit> {
    if raw.contains('%') {
        Some(Unit::Percent)
    } else if raw.contains("ppm") {
        Some(Unit::Ppm)
    } else {
        None
    }
}

/// Unit named in a dedicated unit column.
fn declared_unit(raw: &str) -> Option<Unit> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let lower = raw.to_lowercase();
    if lower.contains('%') {
        Some(Unit::Percent)
    } else if lower.contains("ppm") || lower.contains("mg/kg") {
        Some(Unit::Ppm)
    } else {
        Some(Unit::None)
    }
}

fn cell(row: &Row, idx: Option<usize>) -> Option<&str> {
    let idx = idx?;
    row.get(idx)?.as_deref().map(str::trim)
}

fn populated(row: &Row) -> usize {
    row.iter().flatten().filter(|c| !c.trim().is_empty()).count()
}

/// Normalize every data row of a classified table. Malformed rows are dropped
/// without failing the table.
pub fn normalize(
    table: &ClassifiedTable<'_>,
    cfg: &Config,
    canon: &Canonicalizer,
) -> Vec<NutrientMeasurement> {
    match table.kind {
        TableKind::Standard | TableKind::Tae => normalize_with_header(table, canon),
        TableKind::Positional { tae } => normalize_positional(table, tae, cfg, canon),
    }
}

fn normalize_with_header(
    table: &ClassifiedTable<'_>,
    canon: &Canonicalizer,
) -> Vec<NutrientMeasurement> {
    let cols = &table.columns;
    let category = if table.kind.is_tae() {
        Category::Tae
    } else {
        Category::Standard
    };

    let mut nutrients = Vec::new();
    for row in table.data_rows {
        if row.len() < 2 {
            continue;
        }
        let Some(raw_name) = cell(row, cols.name).filter(|n| !n.is_empty()) else {
            continue;
        };

        let current_raw = cell(row, cols.current);
        let range_text = cell(row, cols.ideal)
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        let ideal_range = range_text.as_deref().and_then(parse_range);

        let unit = current_raw
            .and_then(unit_in_text)
            .or_else(|| cell(row, cols.unit).and_then(declared_unit))
            .unwrap_or(Unit::Ppm);

        nutrients.push(NutrientMeasurement {
            name: canon.canonicalize(raw_name),
            raw_name: raw_name.to_string(),
            current: current_raw.map(parse_value).or(cols.current.map(|_| 0.0)),
            ideal: ideal_range.map(|(lo, hi)| midpoint(lo, hi)),
            ideal_range,
            range_text,
            unit,
            category: Some(category),
        });
    }
    nutrients
}

fn normalize_positional(
    table: &ClassifiedTable<'_>,
    tae: bool,
    cfg: &Config,
    canon: &Canonicalizer,
) -> Vec<NutrientMeasurement> {
    let mut nutrients = Vec::new();

    for row in table.data_rows {
        if populated(row) < 2 {
            continue;
        }
        let name = cell(row, Some(0)).unwrap_or_default();
        let upper = name.to_uppercase();
        if name.is_empty() || upper.contains("ELEMENT") || upper.contains("CATEGORY") {
            continue;
        }
        let current_raw = cell(row, Some(1)).unwrap_or_default();
        let ideal_raw = cell(row, Some(2)).unwrap_or_default();

        let unit = if current_raw.contains("ppm") || ideal_raw.contains("ppm") {
            Unit::Ppm
        } else if current_raw.contains('%') || ideal_raw.contains('%') {
            Unit::Percent
        } else {
            Unit::Ppm
        };
        let current = parse_value(current_raw);
        let (ideal, ideal_range) = parse_loose_ideal(ideal_raw);
        let range_text = (!ideal_raw.is_empty()).then(|| ideal_raw.to_string());

        let base_saturation = unit == Unit::Percent
            && cfg.names.base_saturation.iter().any(|b| b == name);
        if base_saturation && !tae {
            debug!(nutrient = name, current, "Keeping base saturation row");
            nutrients.push(NutrientMeasurement {
                name: canon.canonicalize(name),
                raw_name: name.to_string(),
                current: Some(current),
                ideal,
                ideal_range,
                range_text,
                unit,
                category: None,
            });
            continue;
        }

        if current > 0.0 || ideal.is_some() {
            nutrients.push(NutrientMeasurement {
                name: canon.canonicalize(name),
                raw_name: name.to_string(),
                current: Some(current),
                ideal,
                ideal_range,
                range_text,
                unit,
                category: tae.then_some(Category::Tae),
            });
        }
    }

    nutrients
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::RawTable;
    use crate::heuristics::table::classify;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn run(table: &RawTable) -> Vec<NutrientMeasurement> {
        let cfg = Config::default();
        let canon = Canonicalizer::new(&cfg.names);
        let classified = classify(table, &cfg).unwrap();
        normalize(&classified, &cfg, &canon)
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("1500 ppm"), 1500.0);
        assert_eq!(parse_value("2.35%"), 2.35);
        assert_eq!(parse_value("0.8 mS/cm"), 0.8);
        assert_eq!(parse_value("<0.5"), 0.0);
        assert_eq!(parse_value("< 12"), 0.0);
        assert_eq!(parse_value("n/a"), 0.0);
        assert_eq!(parse_value(""), 0.0);
        assert_eq!(parse_value(".5"), 0.5);
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("1200 - 1800"), Some((1200.0, 1800.0)));
        assert_eq!(parse_range("0.5-1.0 ppm"), Some((0.5, 1.0)));
        assert_eq!(parse_range("1800"), None);
        assert_eq!(parse_range("1-2-3"), None);
        assert_eq!(parse_range("low - high"), None);
    }

    #[test]
    fn test_loose_ideal() {
        assert_eq!(parse_loose_ideal("99 - 124 ppm"), (Some(111.5), Some((99.0, 124.0))));
        assert_eq!(parse_loose_ideal("20"), (Some(20.0), None));
        assert_eq!(parse_loose_ideal("N/A"), (None, None));
    }

    #[test]
    fn test_header_row_normalized() {
        let table = RawTable::from_strs(
            1,
            0,
            &[
                &["Element", "Your Level", "Acceptable Range", "Unit"],
                &["Calcium", "1500 ppm", "1200 - 1800", ""],
            ],
        );
        let rows = run(&table);
        assert_eq!(rows.len(), 1);
        let ca = &rows[0];
        assert_eq!(ca.name, "Calcium");
        assert_eq!(ca.current, Some(1500.0));
        assert_eq!(ca.ideal, Some(1500.0));
        assert_eq!(ca.ideal_range, Some((1200.0, 1800.0)));
        assert_eq!(ca.range_text.as_deref(), Some("1200 - 1800"));
        assert_eq!(ca.unit, Unit::Ppm);
        assert_eq!(ca.category, Some(Category::Standard));
    }

    #[test]
    fn test_declared_unit_used_when_value_has_none() {
        let table = RawTable::from_strs(
            1,
            0,
            &[
                &["Element", "Your Level", "Acceptable Range", "Unit"],
                &["Organic Matter", "4.2", "4 - 6", "%"],
                &["Conductivity", "0.2", "0.1 - 0.3", "mS/cm"],
                &["Boron", "<0.1", "1 - 2", ""],
            ],
        );
        let rows = run(&table);
        assert_eq!(rows[0].unit, Unit::Percent);
        assert_eq!(rows[1].unit, Unit::None);
        assert_eq!(rows[2].unit, Unit::Ppm);
        assert_eq!(rows[2].current, Some(0.0));
    }

    #[test]
    fn test_tae_header_tags_every_row() {
        let table = RawTable::from_strs(
            3,
            0,
            &[
                &["T.A.E.", "Level", "Range", "Unit"],
                &["Calcium", "900 ppm", "800 - 1200", ""],
                &["Zinc", "3 ppm", "", ""],
            ],
        );
        let rows = run(&table);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|n| n.category == Some(Category::Tae)));
        assert_eq!(rows[1].ideal, None);
    }

    #[test]
    fn test_positional_base_saturation_kept() {
        let table = RawTable::from_strs(
            2,
            0,
            &[
                &["Base Saturation", "", "", ""],
                &["Calcium", "0 %", "", ""],
                &["Hydrogen", "0%", "x", ""],
                &["Sodium", "", "", ""],
                &["Zinc", "0", "", "x"],
                &["Copper", "2.1", "", ""],
            ],
        );
        let rows = run(&table);
        let names: Vec<&str> = rows.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["Calcium", "Hydrogen", "Copper"]);
        assert_eq!(rows[0].unit, Unit::Percent);
        assert_eq!(rows[0].ideal, None);
        assert_eq!(rows[0].category, None);
    }

    #[test]
    fn test_positional_tae_table_uses_generic_rule() {
        let table = RawTable::from_strs(
            2,
            0,
            &[
                &["T.A.E results", "", "", ""],
                &["Calcium", "0 %", "", ""],
                &["Magnesium", "12 %", "", ""],
            ],
        );
        let rows = run(&table);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Magnesium");
        assert_eq!(rows[0].category, Some(Category::Tae));
    }

    proptest! {
        #[test]
        fn test_range_midpoint_is_exact(
            low in 0u32..100_000,
            high in 0u32..100_000,
            frac_lo in 0u32..100,
            frac_hi in 0u32..100,
            pad_a in " {0,3}",
            pad_b in " {0,3}",
        ) {
            let lo = format!("{low}.{frac_lo:02}");
            let hi = format!("{high}.{frac_hi:02}");
            let raw = format!("{pad_a}{lo}{pad_b}-{pad_a}{hi}{pad_b}");
            let (l, h) = parse_range(&raw).unwrap();
            let expected = (lo.parse::<f64>().unwrap() + hi.parse::<f64>().unwrap()) / 2.0;
            prop_assert_eq!(midpoint(l, h), expected);
        }

        #[test]
        fn test_censored_value_is_zero(digits in "[0-9]{0,6}(\\.[0-9]{1,3})?", tail in "( ppm| %|)") {
            let raw = format!("<{digits}{tail}");
            prop_assert_eq!(parse_value(&raw), 0.0);
        }
    }
}
