// src/scoring/mod.rs
//
// Deviation-based classification and scoring of extracted analyses.

pub mod score;
pub mod status;

use crate::config::{Config, ScoreParams};
use crate::heuristics::{Analysis, LeafReport};
use serde::Serialize;
use tracing::info;

pub use score::{NutrientScore, SignedStatus, general_score, score_nutrient, smooth_score};
pub use status::{Domain, StatusBuckets, StatusCategory, partition, status};

/// Per-analysis view handed to downstream narrative generation.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    pub analysis_id: usize,
    pub name: String,
    pub paddock: String,
    pub available: StatusBuckets,
    pub tae: StatusBuckets,
}

/// Leaf scores of one paddock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaddockScore {
    pub paddock: String,
    pub nutrients: Vec<NutrientScore>,
    pub general_score: Option<f64>,
}

pub fn summarize(analyses: &[Analysis], cfg: &Config) -> Vec<AnalysisSummary> {
    analyses
        .iter()
        .map(|analysis| {
            let available = status::available_nutrients(&analysis.nutrients);
            let tae = status::tae_nutrients(&analysis.nutrients, &cfg.names.tae_whitelist);
            let summary = AnalysisSummary {
                analysis_id: analysis.id,
                name: analysis.info.name.clone(),
                paddock: analysis.info.paddock.clone(),
                available: partition(available, Domain::AvailableNutrients, &cfg.thresholds),
                tae: partition(tae, Domain::General, &cfg.thresholds),
            };
            info!(
                id = analysis.id,
                available = summary.available.classified_len(),
                tae = summary.tae.classified_len(),
                "Analysis summarized"
            );
            summary
        })
        .collect()
}

/// Score every leaf reading against its paired range. Readings whose range
/// gives a zero ideal are left out.
pub fn score_paddocks(reports: &[LeafReport], params: &ScoreParams) -> Vec<PaddockScore> {
    reports
        .iter()
        .map(|report| {
            let nutrients: Vec<NutrientScore> = report
                .readings
                .iter()
                .filter_map(|r| score_nutrient(&r.label, r.actual, (r.min, r.max), params))
                .collect();
            let general = general_score(&nutrients);
            info!(paddock = %report.paddock, scored = nutrients.len(), general_score = ?general, "Paddock scored");
            PaddockScore {
                paddock: report.paddock.clone(),
                nutrients,
                general_score: general,
            }
        })
        .collect()
}
