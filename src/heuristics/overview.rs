// src/heuristics/overview.rs
//
// "Nutrient Status Overview:" narrative sections, keyed by the paddock whose
// marker precedes them in the full document text.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// paddock name -> overview key -> narrative text
pub type NutrientOverview = BTreeMap<String, BTreeMap<String, String>>;

pub const OVERVIEW_KEYS: [&str; 8] = [
    "Organic Matter",
    "CEC",
    "Soil pH",
    "Base Saturation",
    "Available Nutrients",
    "Lamotte Reams",
    "TAE",
    "Phosphorus Monitoring",
];

const SECTION_MARKER: &str = "Nutrient Status Overview:";
const SECTION_END: &str = "Soil TherapyTM";
const POINT_END: &str = "Soil Therapy TM";
const UNKNOWN_PADDOCK: &str = "UNKNOWN";

static PADDOCK_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"PADDOCK:\s*(.+)").unwrap());
static POINT_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d\.\s").unwrap());
static NEXT_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d\.").unwrap());

pub fn extract_overview(full_text: &str) -> NutrientOverview {
    let paddocks: Vec<(usize, &str)> = PADDOCK_LINE
        .captures_iter(full_text)
        .filter_map(|c| Some((c.get(0)?.start(), c.get(1)?.as_str().trim())))
        .collect();

    let starts: Vec<usize> = full_text
        .match_indices(SECTION_MARKER)
        .map(|(pos, _)| pos)
        .collect();

    let mut results = NutrientOverview::new();

    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(full_text.len());
        let mut section = &full_text[start..end];
        if let Some(cut) = section.find(SECTION_END) {
            section = &section[..cut];
        }

        let paddock = paddocks
            .iter()
            .take_while(|(pos, _)| *pos < start)
            .last()
            .map_or(UNKNOWN_PADDOCK, |(_, name)| *name);

        let entry = results.entry(paddock.to_string()).or_default();
        for point in numbered_points(section) {
            let Some((label, body)) = point.split_once(':') else {
                continue;
            };
            let label = label.trim().to_lowercase();
            let body = body.trim().replace('\n', " ");
            let body = body.split(POINT_END).next().unwrap_or_default();
            for key in OVERVIEW_KEYS {
                if label.contains(&key.to_lowercase()) {
                    entry.insert(key.to_string(), body.to_string());
                }
            }
        }
        debug!(paddock, keys = entry.len(), "Overview section parsed");
    }

    info!(paddocks = results.len(), sections = starts.len(), "Nutrient overview extracted");
    results
}

/// Lazily delimited "N. text" points: each one runs until the next
/// "digit." or the end of the section.
fn numbered_points(section: &str) -> Vec<&str> {
    let mut points = Vec::new();
    let mut pos = 0;
    while let Some(m) = POINT_START.find_at(section, pos) {
        let end = NEXT_NUMBER
            .find_at(section, m.end())
            .map_or(section.len(), |n| n.start());
        points.push(section[m.start()..end].trim());
        pos = end;
    }
    points
}
