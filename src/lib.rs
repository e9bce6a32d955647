pub mod config;
pub mod error;
pub mod heuristics;
pub mod layout;
pub mod nutrients;
pub mod ocr;
pub mod pdf_extract;
pub mod pipeline;
pub mod scoring;

pub use config::Config;
pub use error::ExtractError;
pub use pipeline::{ReportParser, SoilReport};
