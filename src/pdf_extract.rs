// src/pdf_extract.rs

use crate::error::ExtractError;
use crate::heuristics::RawTable;
use crate::layout;
use lopdf::Document;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, info, warn};

/// Where the pipeline gets cell grids and running text from. Both calls see
/// the same immutable document bytes.
pub trait DocumentSource {
    /// Every cell grid in document order, pages 1-based.
    fn tables(&self, pdf_bytes: &[u8]) -> Result<Vec<RawTable>, ExtractError>;
    /// The whole document as plain text.
    fn full_text(&self, pdf_bytes: &[u8]) -> Result<String, ExtractError>;
}

/// Native text layer via lopdf (positioned runs per page) and pdf-extract
/// (whole document).
#[derive(Debug, Clone)]
pub struct LopdfSource {
    /// Share of image-only pages at which the document counts as scanned.
    pub scanned_page_ratio: f64,
}

impl Default for LopdfSource {
    fn default() -> Self {
        Self {
            scanned_page_ratio: 0.8,
        }
    }
}

impl DocumentSource for LopdfSource {
    fn tables(&self, pdf_bytes: &[u8]) -> Result<Vec<RawTable>, ExtractError> {
        let doc = Document::load_mem(pdf_bytes).map_err(|e| {
            tracing::error!(error = %e, "Failed to parse PDF");
            ExtractError::library("tables", e)
        })?;

        if looks_like_scanned(&doc, self.scanned_page_ratio) {
            info!("PDF structural check: likely scanned / image-only");
            return Ok(Vec::new());
        }

        let mut tables = Vec::new();
        let mut next_index = 0;
        for (page, page_id) in doc.get_pages() {
            let span = tracing::info_span!("page", page);
            let _guard = span.enter();

            let fragments = match layout::page_fragments(&doc, page_id) {
                Ok(fragments) => fragments,
                Err(e) => {
                    warn!(error = %e, "Page content decoding failed, skipping page");
                    continue;
                }
            };
            let found = layout::grid_tables(page as usize, fragments, &mut next_index);
            debug!(tables = found.len(), "Page scanned for tables");
            tables.extend(found);
        }

        info!(tables = tables.len(), "Table location complete");
        Ok(tables)
    }

    fn full_text(&self, pdf_bytes: &[u8]) -> Result<String, ExtractError> {
        // pdf-extract panics on some malformed fonts instead of returning Err
        let result = panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(pdf_bytes)));
        match result {
            Ok(Ok(text)) => {
                info!(chars = text.len(), "Full text extracted");
                Ok(text)
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "pdf-extract failed");
                Err(ExtractError::library("full_text", e))
            }
            Err(_) => {
                tracing::error!("pdf-extract panicked");
                Err(ExtractError::library("full_text", "text extraction panicked"))
            }
        }
    }
}

/// Heuristic: inspect the PDF object tree for signs that pages are just
/// images with no text operators.
///
/// We look at each page's `Resources` dictionary. If a page has
/// XObject images but **no** Font resources, it's almost certainly
/// a scanned page.
fn looks_like_scanned(doc: &Document, threshold: f64) -> bool {
    let pages = doc.get_pages();
    if pages.is_empty() {
        return false; // can't tell, let text extraction try
    }

    let mut image_only_pages = 0;

    for object_id in pages.values() {
        let Ok(page_obj) = doc.get_object(*object_id) else {
            continue;
        };
        let Some(page_dict) = page_obj.as_dict().ok() else {
            continue;
        };

        let resources = page_dict
            .get(b"Resources")
            .ok()
            .and_then(|r| doc.dereference(r).ok())
            .and_then(|(_, resolved)| resolved.as_dict().ok());

        let has_entries = |key: &[u8]| {
            resources
                .and_then(|res| res.get(key).ok())
                .and_then(|o| doc.dereference(o).ok())
                .and_then(|(_, resolved)| resolved.as_dict().ok())
                .is_some_and(|d| !d.is_empty())
        };

        if has_entries(b"XObject") && !has_entries(b"Font") {
            image_only_pages += 1;
        }
    }

    let total = pages.len();
    let ratio = image_only_pages as f64 / total as f64;
    info!(
        total_pages = total,
        image_only = image_only_pages,
        ratio = format!("{ratio:.2}"),
        "Scanned-page analysis"
    );

    ratio >= threshold
}
