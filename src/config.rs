use serde::Deserialize;
use std::collections::BTreeMap;
use std::{fs, path::Path};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Every knob of the pipeline. All sections fall back to the built-in
/// tables, so an empty TOML file is a valid config.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub extraction: ExtractionSection,
    pub ocr: OcrSection,
    pub header: HeaderPolicy,
    pub metadata: MetadataPolicy,
    pub names: NameTables,
    pub lamotte: LamotteSection,
    pub thresholds: ThresholdSection,
    pub score: ScoreParams,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionSection {
    /// Tables whose first row is narrower than this are not nutrient tables.
    pub min_table_columns: usize,
    /// Share of image-only pages above which table extraction is skipped.
    pub scanned_page_ratio: f64,
    /// Cell fragments that tag a header-less table as TAE.
    pub tae_table_markers: Vec<String>,
}

impl Default for ExtractionSection {
    fn default() -> Self {
        Self {
            min_table_columns: 4,
            scanned_page_ratio: 0.8,
            tae_table_markers: vec!["T.A.E.".to_string(), "T.A.E".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OcrSection {
    pub enabled: bool,
    pub dpi: u32,
    pub lang: String,
    pub psm: u8,
    pub pdftoppm_path: String,
    pub tesseract_path: String,
}

impl Default for OcrSection {
    fn default() -> Self {
        Self {
            enabled: true,
            dpi: 300,
            lang: "eng".to_string(),
            psm: 3,
            pdftoppm_path: "pdftoppm".to_string(),
            tesseract_path: "tesseract".to_string(),
        }
    }
}

/// How header cells compete for the same column role.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeaderPolicy {
    /// A later header cell matching a role replaces an earlier one.
    pub last_match_wins: bool,
}

impl Default for HeaderPolicy {
    fn default() -> Self {
        Self {
            last_match_wins: true,
        }
    }
}

/// Overwrite rules for analysis context fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetadataPolicy {
    /// Re-run the crop/paddock/date positional guess over every table up to
    /// the current one, filling fields that are still unknown.
    pub positional_rescan: bool,
    /// Explicit "CROP:", "PADDOCK:", "LOCATION:" labels replace values that
    /// are already set. When off, labels only fill unknown fields.
    pub explicit_last_wins: bool,
}

impl Default for MetadataPolicy {
    fn default() -> Self {
        Self {
            positional_rescan: true,
            explicit_last_wins: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NameTables {
    /// Raw OCR label -> canonical nutrient name.
    pub garbled: BTreeMap<String, String>,
    /// Names kept in header-less tables whenever their unit is "%".
    pub base_saturation: Vec<String>,
    /// Names accepted when partitioning TAE rows.
    pub tae_whitelist: Vec<String>,
}

impl Default for NameTables {
    fn default() -> Self {
        let garbled = [
            ("jum (Mehlich II!)", "Calcium"),
            ("ium (Mehlich Ill)", "Magnesium"),
            ("Do (Hot CaCl2)", "Sodium"),
            ("Silicon (CaCl2)", "Silicon"),
            ("(KCl)", "Potassium"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let base_saturation = [
            "Calcium",
            "Magnesium",
            "Potassium",
            "Sodium",
            "Aluminum",
            "Hydrogen",
            "Other Bases",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        let tae_whitelist = [
            "Sodium",
            "Potassium",
            "Calcium",
            "Magnesium",
            "Phosphorus",
            "Aluminium",
            "Copper",
            "Iron",
            "Manganese",
            "Selenium",
            "Zinc",
            "Boron",
            "Silicon",
            "Cobalt",
            "Molybdenum",
            "Sulfur",
            "Sulphur",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        Self {
            garbled,
            base_saturation,
            tae_whitelist,
        }
    }
}

/// Reference ideal and ordinal fallback for one LaMotte/Reams nutrient.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LamotteReference {
    pub ideal: f64,
    /// Zero-based occurrence used when no candidate matches `ideal`.
    pub ordinal: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LamotteSection {
    pub tolerance: f64,
    pub phosphorus: LamotteReference,
    pub calcium: LamotteReference,
    pub magnesium: LamotteReference,
    pub potassium: LamotteReference,
}

impl Default for LamotteSection {
    fn default() -> Self {
        Self {
            tolerance: 0.6,
            phosphorus: LamotteReference {
                ideal: 18.5,
                ordinal: 1,
            },
            calcium: LamotteReference {
                ideal: 1500.0,
                ordinal: 2,
            },
            magnesium: LamotteReference {
                ideal: 212.5,
                ordinal: 2,
            },
            potassium: LamotteReference {
                ideal: 90.0,
                ordinal: 2,
            },
        }
    }
}

/// Deviation percentages separating the five status buckets.
///
/// `deficient` and `marginal_low` are negative. A deviation equal to a
/// boundary falls into the bucket closer to optimal.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Bands {
    pub deficient: f64,
    pub marginal_low: f64,
    pub marginal_high: f64,
    pub excessive: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThresholdSection {
    pub general: Bands,
    pub ph: Bands,
    pub available_nutrients: Bands,
}

impl Default for ThresholdSection {
    fn default() -> Self {
        Self {
            general: Bands {
                deficient: -40.0,
                marginal_low: -18.0,
                marginal_high: 18.0,
                excessive: 40.0,
            },
            ph: Bands {
                deficient: -25.0,
                marginal_low: -10.0,
                marginal_high: 10.0,
                excessive: 25.0,
            },
            available_nutrients: Bands {
                deficient: -60.0,
                marginal_low: -30.0,
                marginal_high: 30.0,
                excessive: 70.0,
            },
        }
    }
}

/// Shape of the smooth health score curve.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ScoreParams {
    /// Deviation (%) at which the score halves.
    pub d: f64,
    pub n: f64,
    /// Deviation (%) at and above which the score is zero.
    pub cutoff: f64,
}

impl Default for ScoreParams {
    fn default() -> Self {
        Self {
            d: 50.0,
            n: 2.0,
            cutoff: 250.0,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.extraction.min_table_columns, 4);
        assert_eq!(cfg.extraction.tae_table_markers, vec!["T.A.E.", "T.A.E"]);
        assert_eq!(cfg.lamotte.tolerance, 0.6);
        assert_eq!(cfg.lamotte.phosphorus.ordinal, 1);
        assert_eq!(cfg.thresholds.general.marginal_low, -18.0);
        assert!(cfg.header.last_match_wins);
        assert_eq!(cfg.names.garbled.get("(KCl)").map(String::as_str), Some("Potassium"));
    }

    #[test]
    fn test_partial_override() {
        let cfg: Config = toml::from_str(
            r#"
            [lamotte]
            tolerance = 1.5

            [thresholds.ph]
            deficient = -30.0
            marginal_low = -12.0
            marginal_high = 12.0
            excessive = 30.0

            [metadata]
            explicit_last_wins = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.lamotte.tolerance, 1.5);
        // untouched fields of a partially given section keep their defaults
        assert_eq!(cfg.lamotte.calcium.ideal, 1500.0);
        assert_eq!(cfg.thresholds.ph.marginal_high, 12.0);
        assert_eq!(cfg.thresholds.general.excessive, 40.0);
        assert!(!cfg.metadata.explicit_last_wins);
        assert!(cfg.metadata.positional_rescan);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read(_)));
    }
}
