// Line-oriented nutrient extraction for OCR output, where no cell grid exists.

use super::rows::{midpoint, parse_value};
use super::{NutrientMeasurement, Unit};
use crate::nutrients::Canonicalizer;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Element code prefixes a leaf/soil line must start with, e.g. "Ca - Calcium".
static ELEMENT_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(N|P|K|S|Ca|Mg|Na|Cu|Zn|Mn|Fe|B|Mo|Si|Co)\s-\s").unwrap());

/// "N - Nitrogen 1.61 % 3.5 - 5.5 %"
static NUTRIENT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z\s-]+)\s+([<\d\.]+)\s*(ppm|%)?\s*([\d\.\s-]+|N/A)?").unwrap()
});

const NAME_PREFIXES: &[&str] = &[
    "N -", "P -", "K -", "S -", "Ca -", "Mg -", "Na -", "Cu -", "Zn -", "Mn -", "Fe -", "B -",
    "Mo -", "Si -", "Co -",
];

static RANGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+\.?\d*)\s*-\s*(\d+\.?\d*)").unwrap());

pub fn extract_nutrients(text: &str, canon: &Canonicalizer) -> Vec<NutrientMeasurement> {
    text.lines()
        .map(str::trim)
        .filter(|line| ELEMENT_PREFIX.is_match(line))
        .filter_map(|line| parse_line(line, canon))
        .collect()
}

pub fn parse_line(line: &str, canon: &Canonicalizer) -> Option<NutrientMeasurement> {
    let caps = NUTRIENT_LINE.captures(line)?;
    let name = caps[1].trim();
    if !NAME_PREFIXES.iter().any(|p| name.starts_with(p)) {
        debug!(line, "OCR line name lost its element prefix");
        return None;
    }

    let unit = match caps.get(3).map(|m| m.as_str()) {
        Some("%") => Unit::Percent,
        Some(_) => Unit::Ppm,
        None if line.contains('%') => Unit::Percent,
        None => Unit::Ppm,
    };

    let range_text = caps
        .get(4)
        .map(|m| m.as_str().trim())
        .filter(|r| !r.is_empty());
    let ideal_range = range_text
        .filter(|r| *r != "N/A")
        .and_then(|r| RANGE.captures(r))
        .and_then(|c| Some((c[1].parse::<f64>().ok()?, c[2].parse::<f64>().ok()?)));

    Some(NutrientMeasurement {
        name: canon.canonicalize(name),
        raw_name: name.to_string(),
        current: Some(parse_value(&caps[2])),
        ideal: ideal_range.map(|(lo, hi)| midpoint(lo, hi)),
        ideal_range,
        range_text: range_text.map(str::to_string),
        unit,
        category: None,
    })
}
