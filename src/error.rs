// src/error.rs

use thiserror::Error;

/// Failures surfaced by a single document run.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("No file uploaded")]
    NoFileSupplied,

    /// Neither native tables nor OCR produced a single nutrient row.
    #[error("No nutrients extracted from PDF (neither tables nor OCR).")]
    NoNutrients,

    /// lopdf / pdf-extract blew up. Logged and surfaced, never retried.
    #[error("Exception during PDF extraction ({stage}): {message}")]
    Library { stage: &'static str, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    pub fn library(stage: &'static str, err: impl std::fmt::Display) -> Self {
        ExtractError::Library {
            stage,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_nutrients_message() {
        let err = ExtractError::NoNutrients;
        assert!(err.to_string().contains("neither tables nor OCR"));
    }

    #[test]
    fn test_library_error_keeps_stage_and_message() {
        let err = ExtractError::library("tables", "invalid xref");
        let msg = err.to_string();
        assert!(msg.contains("tables"));
        assert!(msg.contains("invalid xref"));
    }
}
