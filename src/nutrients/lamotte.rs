// src/nutrients/lamotte.rs
//
// LaMotte/Reams duplicate resolution. Reports print Ca, Mg, P and K several
// times (Mehlich, TAE, LaMotte); the LaMotte row is picked by its reference
// ideal, or by its position in the document when no ideal matches.

use crate::config::{LamotteReference, LamotteSection};
use crate::heuristics::{Analysis, Category, NutrientMeasurement, Unit};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Resolution order of `LamottePayload::selected`.
pub const TARGETS: [&str; 4] = ["Phosphorus", "Calcium", "Magnesium", "Potassium"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LamottePayload {
    /// LaMotte-eligible rows in document order, renamed to their base nutrient.
    pub candidates: Vec<NutrientMeasurement>,
    /// Phosphorus, Calcium, Magnesium, Potassium.
    pub selected: [Option<NutrientMeasurement>; 4],
}

impl LamottePayload {
    pub fn get(&self, nutrient: &str) -> Option<&NutrientMeasurement> {
        let idx = TARGETS.iter().position(|t| t.eq_ignore_ascii_case(nutrient))?;
        self.selected[idx].as_ref()
    }
}

fn reference<'a>(cfg: &'a LamotteSection, target: &str) -> &'a LamotteReference {
    match target {
        "Phosphorus" => &cfg.phosphorus,
        "Calcium" => &cfg.calcium,
        "Magnesium" => &cfg.magnesium,
        _ => &cfg.potassium,
    }
}

fn target_of(name: &str) -> Option<&'static str> {
    let lower = name.to_lowercase();
    TARGETS
        .into_iter()
        .find(|t| lower.starts_with(&t.to_lowercase()))
}

fn is_candidate(m: &NutrientMeasurement) -> bool {
    m.unit == Unit::Ppm
        && m.category != Some(Category::Tae)
        && !m.raw_name.to_lowercase().contains("(mehlich")
        && target_of(&m.name).is_some()
}

/// Runs over every analysis of the document at once, so it must only be
/// called after extraction has finished.
pub fn resolve(analyses: &[Analysis], cfg: &LamotteSection) -> LamottePayload {
    let all: Vec<&NutrientMeasurement> = analyses.iter().flat_map(|a| &a.nutrients).collect();

    let candidates: Vec<NutrientMeasurement> = all
        .iter()
        .filter(|m| is_candidate(m))
        .filter_map(|m| {
            let target = target_of(&m.name)?;
            Some(NutrientMeasurement {
                name: target.to_string(),
                ..(*m).clone()
            })
        })
        .collect();

    let selected = TARGETS.map(|target| {
        let reference = reference(cfg, target);
        if let Some(hit) = candidates.iter().find(|c| {
            c.name == target
                && c.ideal
                    .is_some_and(|ideal| (ideal - reference.ideal).abs() <= cfg.tolerance)
        }) {
            debug!(nutrient = target, ideal = ?hit.ideal, "LaMotte match by reference ideal");
            return Some(hit.clone());
        }

        // same base name in ppm, Mehlich and TAE rows included
        let occurrences: Vec<&&NutrientMeasurement> = all
            .iter()
            .filter(|m| m.unit == Unit::Ppm && target_of(&m.name) == Some(target))
            .collect();
        let last = occurrences.len().checked_sub(1)?;
        let pick = occurrences[reference.ordinal.min(last)];
        debug!(
            nutrient = target,
            ordinal = reference.ordinal.min(last),
            "LaMotte fallback by document position"
        );
        Some(NutrientMeasurement {
            name: target.to_string(),
            ..(**pick).clone()
        })
    });

    info!(
        candidates = candidates.len(),
        resolved = selected.iter().flatten().count(),
        "LaMotte/Reams resolution"
    );
    LamottePayload {
        candidates,
        selected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::AnalysisInfo;
    use pretty_assertions::assert_eq;

    fn ppm(name: &str, raw: &str, current: f64, ideal: f64, category: Option<Category>) -> NutrientMeasurement {
        NutrientMeasurement {
            name: name.to_string(),
            raw_name: raw.to_string(),
            current: Some(current),
            ideal: Some(ideal),
            ideal_range: None,
            range_text: None,
            unit: Unit::Ppm,
            category,
        }
    }

    fn analysis(id: usize, nutrients: Vec<NutrientMeasurement>) -> Analysis {
        Analysis {
            id,
            nutrients,
            info: AnalysisInfo::new(format!("Analysis {}", id + 1), 1),
        }
    }

    #[test]
    fn test_calcium_matched_by_reference_ideal() {
        let analyses = vec![
            analysis(0, vec![ppm("Calcium", "Calcium (Mehlich III)", 1700.0, 1499.8, None)]),
            analysis(
                1,
                vec![
                    ppm("Calcium", "Calcium", 1100.0, 1200.0, Some(Category::Standard)),
                    ppm("Calcium", "Calcium", 1350.0, 1499.6, Some(Category::Standard)),
                ],
            ),
        ];
        let payload = resolve(&analyses, &LamotteSection::default());
        // the Mehlich row is not a candidate even though its ideal matches
        assert_eq!(payload.candidates.len(), 2);
        let ca = payload.get("calcium").unwrap();
        assert_eq!(ca.current, Some(1350.0));
        assert_eq!(ca.ideal, Some(1499.6));
    }

    #[test]
    fn test_calcium_falls_back_to_third_occurrence() {
        let analyses = vec![analysis(
            0,
            vec![
                ppm("Calcium", "Calcium", 1000.0, 1200.0, None),
                ppm("Calcium", "Calcium", 1100.0, 1498.0, None),
                ppm("Calcium", "Calcium", 1200.0, 900.0, None),
            ],
        )];
        let payload = resolve(&analyses, &LamotteSection::default());
        assert_eq!(payload.get("Calcium").unwrap().ideal, Some(900.0));
    }

    #[test]
    fn test_ordinal_clamped_and_includes_tae_rows() {
        let analyses = vec![analysis(
            0,
            vec![
                ppm("Phosphorus", "Phosphorus (Mehlich III)", 30.0, 50.0, None),
                ppm("Magnesium", "Magnesium", 150.0, 140.0, Some(Category::Tae)),
            ],
        )];
        let payload = resolve(&analyses, &LamotteSection::default());
        assert!(payload.candidates.is_empty());
        // only one phosphorus occurrence: ordinal 1 clamps to it
        assert_eq!(payload.get("Phosphorus").unwrap().current, Some(30.0));
        assert_eq!(payload.get("Magnesium").unwrap().current, Some(150.0));
        assert_eq!(payload.get("Potassium"), None);
    }

    #[test]
    fn test_percent_rows_ignored() {
        let mut k = ppm("Potassium", "Potassium", 4.0, 90.0, None);
        k.unit = Unit::Percent;
        let payload = resolve(&[analysis(0, vec![k])], &LamotteSection::default());
        assert!(payload.candidates.is_empty());
        assert_eq!(payload.selected, [None, None, None, None]);
    }

    #[test]
    fn test_qualified_name_renamed_to_base() {
        let analyses = vec![analysis(
            0,
            vec![ppm("Potassium - LaMotte", "Potassium - LaMotte", 85.0, 90.2, None)],
        )];
        let payload = resolve(&analyses, &LamotteSection::default());
        assert_eq!(payload.candidates[0].name, "Potassium");
        assert_eq!(payload.candidates[0].raw_name, "Potassium - LaMotte");
        assert_eq!(payload.get("Potassium").unwrap().current, Some(85.0));
    }
}
