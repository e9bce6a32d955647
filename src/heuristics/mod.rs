// src/heuristics/mod.rs

pub mod leaf;
pub mod metadata;
pub mod overview;
pub mod rows;
pub mod table;
pub mod text;

use crate::config::Config;
use crate::nutrients::Canonicalizer;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use leaf::{LeafReport, extract_leaf_reports};
pub use overview::{NutrientOverview, extract_overview};

/// One cell grid as located on a page. Cells are `None` where the
/// extractor saw nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    /// 1-based page number.
    pub page: usize,
    /// Position of the table in the whole document.
    pub index: usize,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn new(page: usize, index: usize, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { page, index, rows }
    }

    /// Convenience for building tables from string literals.
    pub fn from_strs(page: usize, index: usize, rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|r| {
                r.iter()
                    .map(|c| if c.is_empty() { None } else { Some(c.to_string()) })
                    .collect()
            })
            .collect();
        Self { page, index, rows }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "ppm")]
    Ppm,
    #[serde(rename = "%")]
    Percent,
    #[serde(rename = "")]
    None,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Ppm => "ppm",
            Unit::Percent => "%",
            Unit::None => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Standard,
    Tae,
}

/// A single nutrient row after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutrientMeasurement {
    /// Canonical name.
    pub name: String,
    /// Label exactly as printed.
    pub raw_name: String,
    /// Never negative. Censored ("<0.5") and unparseable readings are 0.
    pub current: Option<f64>,
    pub ideal: Option<f64>,
    pub ideal_range: Option<(f64, f64)>,
    /// The lab's own range string, kept for display.
    #[serde(rename = "range")]
    pub range_text: Option<String>,
    pub unit: Unit,
    pub category: Option<Category>,
}

/// Context recovered for one analysis. Unrecovered fields read "Unknown".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisInfo {
    pub name: String,
    pub page: usize,
    pub crop: String,
    pub location: String,
    pub date: String,
    pub paddock: String,
}

pub const UNKNOWN: &str = "Unknown";

impl AnalysisInfo {
    pub fn new(name: impl Into<String>, page: usize) -> Self {
        Self {
            name: name.into(),
            page,
            crop: UNKNOWN.to_string(),
            location: UNKNOWN.to_string(),
            date: UNKNOWN.to_string(),
            paddock: UNKNOWN.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub id: usize,
    pub nutrients: Vec<NutrientMeasurement>,
    pub info: AnalysisInfo,
}

/// Turn every located table into an analysis. Tables that yield no nutrient
/// rows are dropped, so ids stay dense.
pub fn extract_analyses(tables: &[RawTable], cfg: &Config) -> Vec<Analysis> {
    let canon = Canonicalizer::new(&cfg.names);
    let mut analyses = Vec::new();

    for (table_idx, raw) in tables.iter().enumerate() {
        let span = tracing::info_span!("table", idx = table_idx, page = raw.page);
        let _guard = span.enter();

        let Some(classified) = table::classify(raw, cfg) else {
            debug!(rows = raw.rows.len(), "Skipping table: too small for nutrient data");
            continue;
        };
        info!(kind = ?classified.kind, columns = ?classified.columns, "Classified table");

        let nutrients = rows::normalize(&classified, cfg, &canon);
        if nutrients.is_empty() {
            debug!("No nutrient rows in table");
            continue;
        }

        let info = metadata::associate(tables, table_idx, &cfg.metadata);
        info!(
            id = analyses.len(),
            nutrients = nutrients.len(),
            crop = %info.crop,
            paddock = %info.paddock,
            date = %info.date,
            "Analysis extracted"
        );
        analyses.push(Analysis {
            id: analyses.len(),
            nutrients,
            info,
        });
    }

    analyses
}

/// Single pseudo-analysis from OCR text, or nothing if no line parsed.
pub fn extract_from_ocr_text(text: &str, cfg: &Config) -> Option<Analysis> {
    let canon = Canonicalizer::new(&cfg.names);
    let nutrients = text::extract_nutrients(text, &canon);
    if nutrients.is_empty() {
        return None;
    }
    Some(Analysis {
        id: 0,
        nutrients,
        info: AnalysisInfo::new("OCR Analysis", 1),
    })
}
