use clap::Parser;
use serde::Serialize;
use soil_report::scoring::{self, AnalysisSummary, PaddockScore};
use soil_report::{Config, ReportParser, SoilReport};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Extract nutrient tables from soil and plant lab reports")]
struct Args {
    /// Lab report PDF
    pdf: PathBuf,
    /// TOML file overriding the built-in name tables and thresholds
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Never fall back to OCR for scanned reports
    #[arg(long)]
    no_ocr: bool,
}

#[derive(Serialize)]
struct Output<'a> {
    report: &'a SoilReport,
    summary: Vec<AnalysisSummary>,
    paddock_scores: Vec<PaddockScore>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // init tracing
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter("info")
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if args.no_ocr {
        cfg.ocr.enabled = false;
    }

    let span = tracing::info_span!("pdf", filename = %args.pdf.display());
    let _guard = span.enter();

    let bytes = std::fs::read(&args.pdf)?;
    info!(bytes = bytes.len(), "Loaded PDF");

    let parser = ReportParser::new(cfg);
    let report = match parser.process(&bytes) {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, "Failed to process PDF");
            return Err(e.into());
        }
    };
    let summary = scoring::summarize(&report.analyses, parser.config());
    let paddock_scores = scoring::score_paddocks(&report.leaf_reports, &parser.config().score);

    let out = Output {
        report: &report,
        summary,
        paddock_scores,
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
