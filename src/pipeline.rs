// src/pipeline.rs

use crate::config::Config;
use crate::error::ExtractError;
use crate::heuristics::{self, Analysis, LeafReport, NutrientOverview};
use crate::nutrients::lamotte::{self, LamottePayload};
use crate::ocr::{OcrEngine, TesseractCli};
use crate::pdf_extract::{DocumentSource, LopdfSource};
use serde::Serialize;
use tracing::{info, warn};

/// Everything recovered from one document.
#[derive(Debug, Clone, Serialize)]
pub struct SoilReport {
    pub analyses: Vec<Analysis>,
    pub count: usize,
    pub lamotte: LamottePayload,
    pub nutrient_overview: NutrientOverview,
    /// Plant-leaf readings per paddock, empty for soil-only reports.
    pub leaf_reports: Vec<LeafReport>,
}

/// One way of turning document bytes into analyses.
pub trait ExtractionStrategy {
    fn name(&self) -> &'static str;
    fn extract(&self, pdf_bytes: &[u8], cfg: &Config) -> Result<Vec<Analysis>, ExtractError>;
}

/// Cell grids from the native text layer.
pub struct TableStrategy<'a> {
    pub source: &'a dyn DocumentSource,
}

impl ExtractionStrategy for TableStrategy<'_> {
    fn name(&self) -> &'static str {
        "tables"
    }

    fn extract(&self, pdf_bytes: &[u8], cfg: &Config) -> Result<Vec<Analysis>, ExtractError> {
        let tables = self.source.tables(pdf_bytes)?;
        info!(tables = tables.len(), "Located tables");
        Ok(heuristics::extract_analyses(&tables, cfg))
    }
}

/// Page images through OCR, then line parsing. At most one analysis.
pub struct OcrStrategy<'a> {
    pub engine: &'a dyn OcrEngine,
}

impl ExtractionStrategy for OcrStrategy<'_> {
    fn name(&self) -> &'static str {
        "ocr"
    }

    fn extract(&self, pdf_bytes: &[u8], cfg: &Config) -> Result<Vec<Analysis>, ExtractError> {
        let pages = match self.engine.recognize_pages(pdf_bytes) {
            Ok(pages) => pages,
            Err(e) => {
                warn!(error = %e, "OCR unavailable, no fallback text");
                return Ok(Vec::new());
            }
        };
        let text = pages.join("\n");
        if text.trim().is_empty() {
            info!(pages = pages.len(), "OCR produced no text");
            return Ok(Vec::new());
        }
        Ok(heuristics::extract_from_ocr_text(&text, cfg)
            .into_iter()
            .collect())
    }
}

pub struct ReportParser {
    config: Config,
    source: Box<dyn DocumentSource>,
    ocr: Option<Box<dyn OcrEngine>>,
}

impl ReportParser {
    /// lopdf text layer plus the Tesseract CLI when OCR is enabled.
    pub fn new(config: Config) -> Self {
        let source = Box::new(LopdfSource {
            scanned_page_ratio: config.extraction.scanned_page_ratio,
        });
        let ocr: Option<Box<dyn OcrEngine>> = if config.ocr.enabled {
            let cli = TesseractCli::new(config.ocr.clone());
            if !cli.is_available() {
                warn!(
                    pdftoppm = %config.ocr.pdftoppm_path,
                    tesseract = %config.ocr.tesseract_path,
                    "OCR tools not found, scanned reports will yield nothing"
                );
            }
            Some(Box::new(cli))
        } else {
            None
        };
        Self::with_sources(config, source, ocr)
    }

    pub fn with_sources(
        config: Config,
        source: Box<dyn DocumentSource>,
        ocr: Option<Box<dyn OcrEngine>>,
    ) -> Self {
        Self {
            config,
            source,
            ocr,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Tables first; OCR only when the tables gave nothing. Duplicate
    /// resolution waits for the finished analysis list.
    pub fn process(&self, pdf_bytes: &[u8]) -> Result<SoilReport, ExtractError> {
        if pdf_bytes.is_empty() {
            return Err(ExtractError::NoFileSupplied);
        }

        let mut strategies: Vec<Box<dyn ExtractionStrategy + '_>> = vec![Box::new(TableStrategy {
            source: self.source.as_ref(),
        })];
        if let Some(engine) = &self.ocr {
            strategies.push(Box::new(OcrStrategy {
                engine: engine.as_ref(),
            }));
        }

        let mut analyses = Vec::new();
        for strategy in &strategies {
            let span = tracing::info_span!("strategy", name = strategy.name());
            let _guard = span.enter();

            analyses = strategy.extract(pdf_bytes, &self.config)?;
            info!(analyses = analyses.len(), "Strategy finished");
            if !analyses.is_empty() {
                break;
            }
        }

        if analyses.is_empty() {
            warn!("No nutrients extracted from PDF");
            return Err(ExtractError::NoNutrients);
        }

        let lamotte = lamotte::resolve(&analyses, &self.config.lamotte);

        let (nutrient_overview, leaf_reports) = match self.source.full_text(pdf_bytes) {
            Ok(text) => (heuristics::extract_overview(&text), heuristics::extract_leaf_reports(&text)),
            Err(e) => {
                warn!(error = %e, "Full text unavailable, overview and leaf reports left empty");
                (NutrientOverview::new(), Vec::new())
            }
        };

        Ok(SoilReport {
            count: analyses.len(),
            analyses,
            lamotte,
            nutrient_overview,
            leaf_reports,
        })
    }
}
