use crate::config::ScoreParams;
use serde::{Deserialize, Serialize};

/// 0-100 health score for a deviation given as a fraction (0.25 = 25%).
/// 100 at zero, falling off as `1 / (1 + (x/d)^n)`, and zero from the cutoff
/// onward.
pub fn smooth_score(deviation_fraction: f64, params: &ScoreParams) -> f64 {
    let x = deviation_fraction.abs() * 100.0;
    if x >= params.cutoff {
        return 0.0;
    }
    let score = 100.0 / (1.0 + (x / params.d).powf(params.n));
    score.clamp(0.0, 100.0)
}

/// Coarse signed label reported next to the score. Its breakpoints are
/// unrelated to the score curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignedStatus {
    #[serde(rename = "Extremely Deficient")]
    ExtremelyDeficient,
    Deficient,
    Good,
    Excessive,
    #[serde(rename = "Extremely Excessive")]
    ExtremelyExcessive,
}

pub fn signed_status(deviation_pct: f64) -> SignedStatus {
    if deviation_pct <= -100.0 {
        SignedStatus::ExtremelyDeficient
    } else if deviation_pct <= -25.0 {
        SignedStatus::Deficient
    } else if deviation_pct < 25.0 {
        SignedStatus::Good
    } else if deviation_pct <= 100.0 {
        SignedStatus::Excessive
    } else {
        SignedStatus::ExtremelyExcessive
    }
}

/// Nutrients whose leaf target is the top of the lab range, not its middle.
const RANGE_MAX_TARGETS: [&str; 4] = ["Phosphorus", "Calcium", "Magnesium", "Boron"];

pub fn plant_ideal(label: &str, low: f64, high: f64) -> f64 {
    if RANGE_MAX_TARGETS.iter().any(|t| label.contains(t)) {
        high
    } else {
        (low + high) / 2.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutrientScore {
    pub nutrient: String,
    pub actual: f64,
    pub min: f64,
    pub max: f64,
    pub ideal: f64,
    pub deviation_pct: f64,
    pub score: f64,
    pub status: SignedStatus,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// `None` when the range gives a zero ideal.
pub fn score_nutrient(
    label: &str,
    actual: f64,
    (min, max): (f64, f64),
    params: &ScoreParams,
) -> Option<NutrientScore> {
    let ideal = plant_ideal(label, min, max);
    if ideal == 0.0 {
        return None;
    }
    let deviation = (actual - ideal) / ideal;
    let deviation_pct = deviation * 100.0;
    Some(NutrientScore {
        nutrient: label.to_string(),
        actual,
        min,
        max,
        ideal,
        deviation_pct: round2(deviation_pct),
        score: round2(smooth_score(deviation, params)),
        status: signed_status(deviation_pct),
    })
}

/// Mean score of a paddock, or `None` with nothing to average.
pub fn general_score(scores: &[NutrientScore]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    let sum: f64 = scores.iter().map(|s| s.score).sum();
    Some(round2(sum / scores.len() as f64))
}
