use crate::config::{Bands, ThresholdSection};
use crate::heuristics::{Category, NutrientMeasurement, Unit};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Which threshold table a measurement is judged against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    General,
    Ph,
    AvailableNutrients,
}

impl Domain {
    pub fn bands<'a>(&self, thresholds: &'a ThresholdSection) -> &'a Bands {
        match self {
            Domain::General => &thresholds.general,
            Domain::Ph => &thresholds.ph,
            Domain::AvailableNutrients => &thresholds.available_nutrients,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCategory {
    Deficient,
    MarginallyDeficient,
    Optimal,
    MarginallyExcessive,
    Excessive,
}

/// Percentage deviation of `current` from `ideal`. `None` when either side
/// is missing or the ideal is zero.
pub fn deviation_pct(current: Option<f64>, ideal: Option<f64>) -> Option<f64> {
    let (current, ideal) = (current?, ideal?);
    if ideal == 0.0 {
        return None;
    }
    Some((current - ideal) * 100.0 / ideal)
}

pub fn classify(deviation: f64, bands: &Bands) -> StatusCategory {
    if deviation < bands.deficient {
        StatusCategory::Deficient
    } else if deviation < bands.marginal_low {
        StatusCategory::MarginallyDeficient
    } else if deviation <= bands.marginal_high {
        StatusCategory::Optimal
    } else if deviation <= bands.excessive {
        StatusCategory::MarginallyExcessive
    } else {
        StatusCategory::Excessive
    }
}

pub fn status(
    current: Option<f64>,
    ideal: Option<f64>,
    domain: Domain,
    thresholds: &ThresholdSection,
) -> Option<StatusCategory> {
    deviation_pct(current, ideal).map(|dev| classify(dev, domain.bands(thresholds)))
}

/// The slice of a measurement that narrative generation gets to see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketEntry {
    pub name: String,
    pub current: Option<f64>,
    pub ideal: Option<f64>,
    pub unit: Unit,
    pub category: Option<Category>,
}

impl From<&NutrientMeasurement> for BucketEntry {
    fn from(m: &NutrientMeasurement) -> Self {
        Self {
            name: m.name.clone(),
            current: m.current,
            ideal: m.ideal,
            unit: m.unit,
            category: m.category,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusBuckets {
    pub deficient: Vec<BucketEntry>,
    pub marginally_deficient: Vec<BucketEntry>,
    pub optimal: Vec<BucketEntry>,
    pub marginally_excessive: Vec<BucketEntry>,
    pub excessive: Vec<BucketEntry>,
    /// No ideal (or a zero ideal) to compare against.
    pub unclassified: Vec<BucketEntry>,
}

impl StatusBuckets {
    pub fn bucket(&self, status: StatusCategory) -> &[BucketEntry] {
        match status {
            StatusCategory::Deficient => &self.deficient,
            StatusCategory::MarginallyDeficient => &self.marginally_deficient,
            StatusCategory::Optimal => &self.optimal,
            StatusCategory::MarginallyExcessive => &self.marginally_excessive,
            StatusCategory::Excessive => &self.excessive,
        }
    }

    pub fn classified_len(&self) -> usize {
        self.deficient.len()
            + self.marginally_deficient.len()
            + self.optimal.len()
            + self.marginally_excessive.len()
            + self.excessive.len()
    }
}

pub fn partition<'a>(
    nutrients: impl IntoIterator<Item = &'a NutrientMeasurement>,
    domain: Domain,
    thresholds: &ThresholdSection,
) -> StatusBuckets {
    let mut buckets = StatusBuckets::default();
    for m in nutrients {
        let entry = BucketEntry::from(m);
        let target = match status(m.current, m.ideal, domain, thresholds) {
            Some(StatusCategory::Deficient) => &mut buckets.deficient,
            Some(StatusCategory::MarginallyDeficient) => &mut buckets.marginally_deficient,
            Some(StatusCategory::Optimal) => &mut buckets.optimal,
            Some(StatusCategory::MarginallyExcessive) => &mut buckets.marginally_excessive,
            Some(StatusCategory::Excessive) => &mut buckets.excessive,
            None => &mut buckets.unclassified,
        };
        target.push(entry);
    }
    buckets
}

/// Non-TAE rows, first occurrence per canonical name.
pub fn available_nutrients(nutrients: &[NutrientMeasurement]) -> Vec<&NutrientMeasurement> {
    let mut seen = HashSet::new();
    nutrients
        .iter()
        .filter(|m| m.category != Some(Category::Tae))
        .filter(|m| seen.insert(m.name.to_lowercase()))
        .collect()
}

/// TAE rows whose name is on the whitelist, first occurrence per name.
pub fn tae_nutrients<'a>(
    nutrients: &'a [NutrientMeasurement],
    whitelist: &[String],
) -> Vec<&'a NutrientMeasurement> {
    let mut seen = HashSet::new();
    nutrients
        .iter()
        .filter(|m| m.category == Some(Category::Tae))
        .filter(|m| whitelist.iter().any(|w| w.eq_ignore_ascii_case(&m.name)))
        .filter(|m| seen.insert(m.name.to_lowercase()))
        .collect()
}
