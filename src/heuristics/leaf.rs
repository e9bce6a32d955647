// src/heuristics/leaf.rs
//
// Plant-leaf reports: per paddock, the printed readings of the 15 leaf
// nutrients paired in order with the ranges listed under the
// "Plant TherapyTM" block.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const LEAF_LABELS: [&str; 15] = [
    "N - Nitrogen",
    "P - Phosphorus",
    "K - Potassium",
    "S - Sulphur",
    "Ca - Calcium",
    "Mg - Magnesium",
    "Na - Sodium",
    "Cu - Copper",
    "Zn - Zinc",
    "Mn - Manganese",
    "Fe - Iron",
    "B - Boron",
    "Mo - Molybdenum",
    "Si - Silicon",
    "Co - Cobalt",
];

const PADDOCK_MARKER: &str = "PADDOCK:";
const RANGE_BLOCK_MARKER: &str = "Plant TherapyTM";

static RANGE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+\.?\d*)\s*-\s*(\d+\.?\d*)").unwrap());

/// One printed reading and the range it was paired with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafReading {
    /// The whole label line as printed.
    pub label: String,
    pub actual: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafReport {
    pub paddock: String,
    pub readings: Vec<LeafReading>,
}

fn clean_paddock(line: &str) -> String {
    line.replace(['\u{201c}', '\u{201d}'], "\"").replace('\u{2013}', "-")
}

/// Label lines, each paired with the first later line that is a bare number.
/// Scanning resumes at that number line.
fn readings(lines: &[&str]) -> Vec<(String, f64)> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i].trim();
        if !LEAF_LABELS.iter().any(|l| line.contains(l)) {
            i += 1;
            continue;
        }
        let mut j = i + 1;
        while j < lines.len() {
            if let Some(value) = lines[j].trim().parse::<f64>().ok().filter(|v| v.is_finite()) {
                out.push((line.to_string(), value));
                break;
            }
            j += 1;
        }
        i = j;
    }
    out.truncate(LEAF_LABELS.len());
    out
}

/// `low - high` at the start of a line, skipping lines marked N/A.
fn ranges(block: &str) -> Vec<(f64, f64)> {
    block
        .lines()
        .map(str::trim)
        .filter(|line| !line.contains("N/A"))
        .filter_map(|line| {
            let caps = RANGE_LINE.captures(line)?;
            Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
        })
        .collect()
}

/// Paddocks without a range block, or whose block lists no ranges, are
/// skipped. Readings and ranges pair up in order; extras on either side are
/// dropped.
pub fn extract_leaf_reports(full_text: &str) -> Vec<LeafReport> {
    let mut reports = Vec::new();

    for section in full_text.split(PADDOCK_MARKER).skip(1) {
        let lines: Vec<&str> = section.lines().collect();
        let paddock = lines
            .iter()
            .map(|l| l.trim())
            .find(|l| !l.is_empty())
            .map_or_else(|| "Unknown".to_string(), clean_paddock);

        let actual = readings(&lines);

        let Some(block) = section.split(RANGE_BLOCK_MARKER).nth(1) else {
            warn!(paddock = %paddock, "Skipping paddock: no ideal range block");
            continue;
        };
        let ranges = ranges(block);
        if ranges.is_empty() {
            warn!(paddock = %paddock, "Skipping paddock: no usable ranges found");
            continue;
        }

        let readings: Vec<LeafReading> = actual
            .into_iter()
            .zip(ranges)
            .map(|((label, actual), (min, max))| LeafReading {
                label,
                actual,
                min,
                max,
            })
            .collect();
        debug!(paddock = %paddock, readings = readings.len(), "Leaf report parsed");
        reports.push(LeafReport { paddock, readings });
    }

    info!(reports = reports.len(), "Leaf reports extracted");
    reports
}
