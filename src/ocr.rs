// src/ocr.rs
//
// OCR fallback for scanned reports: pdftoppm rasterizes, tesseract reads.

use crate::config::OcrSection;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("OCR tool not found: {0}")]
    ToolMissing(String),

    #[error("rasterizing PDF failed: {0}")]
    Rasterize(String),

    #[error("OCR failed on page {page}: {message}")]
    Recognize { page: usize, message: String },

    #[error("OCR I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-page text recognition. Page order is preserved; a page the engine
/// could not read comes back as an empty string.
pub trait OcrEngine {
    fn recognize_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, OcrError>;
}

/// Poppler + Tesseract command-line tools.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    cfg: OcrSection,
}

impl TesseractCli {
    pub fn new(cfg: OcrSection) -> Self {
        Self { cfg }
    }

    /// Both binaries answer `-v`.
    pub fn is_available(&self) -> bool {
        [&self.cfg.pdftoppm_path, &self.cfg.tesseract_path]
            .iter()
            .all(|tool| Command::new(tool).arg("-v").output().is_ok())
    }

    fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, OcrError> {
        let prefix = out_dir.join("page");
        let output = Command::new(&self.cfg.pdftoppm_path)
            .arg("-png")
            .arg("-r")
            .arg(self.cfg.dpi.to_string())
            .arg(pdf)
            .arg(&prefix)
            .output()
            .map_err(|e| tool_error(&self.cfg.pdftoppm_path, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Rasterize(stderr.trim().to_string()));
        }

        // pdftoppm zero-pads page numbers to a common width, so names sort
        let mut pages: Vec<PathBuf> = fs::read_dir(out_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
            .collect();
        pages.sort();
        Ok(pages)
    }

    fn recognize(&self, page: usize, image: &Path) -> Result<String, OcrError> {
        let output = Command::new(&self.cfg.tesseract_path)
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.cfg.lang)
            .arg("--psm")
            .arg(self.cfg.psm.to_string())
            .output()
            .map_err(|e| tool_error(&self.cfg.tesseract_path, e))?;

        if !output.status.success() {
            return Err(OcrError::Recognize {
                page,
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn tool_error(tool: &str, err: std::io::Error) -> OcrError {
    if err.kind() == std::io::ErrorKind::NotFound {
        OcrError::ToolMissing(tool.to_string())
    } else {
        OcrError::Io(err)
    }
}

impl OcrEngine for TesseractCli {
    fn recognize_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, OcrError> {
        let dir = tempfile::tempdir()?;
        let pdf = dir.path().join("input.pdf");
        fs::write(&pdf, pdf_bytes)?;

        let images = self.rasterize(&pdf, dir.path())?;
        info!(pages = images.len(), dpi = self.cfg.dpi, "Rasterized PDF for OCR");

        let mut texts = Vec::with_capacity(images.len());
        for (idx, image) in images.iter().enumerate() {
            let page = idx + 1;
            match self.recognize(page, image) {
                Ok(text) => {
                    debug!(page, chars = text.len(), "OCR page done");
                    texts.push(text);
                }
                Err(e) => {
                    warn!(page, error = %e, "OCR failed for page, continuing");
                    texts.push(String::new());
                }
            }
        }
        Ok(texts)
    }
}
