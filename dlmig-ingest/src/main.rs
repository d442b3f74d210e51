//! dlmig-ingest - Main entry point
//!
//! Migrates a batch of digitized-library exports into the image server and
//! digital library import layout.

use anyhow::{Context, Result};
use clap::Parser;
use dlmig_ingest::config::{CliArgs, IngestConfig};
use dlmig_ingest::models::BatchReport;
use dlmig_ingest::services::{BatchDriver, PackMatcher, TitleOrchestrator};
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "dlmig_ingest=info,dlmig_common=info";

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let toml_config =
        dlmig_common::config::load_config(args.config.as_deref()).context("Failed to load configuration file")?;

    // RUST_LOG > [logging] level > default
    let fallback_filter = toml_config
        .logging
        .level
        .clone()
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting dlmig-ingest v{}", env!("CARGO_PKG_VERSION"));

    let config = IngestConfig::resolve(&args, &toml_config).context("Invalid configuration")?;

    let orchestrator = TitleOrchestrator::from_config(&config).context("Failed to initialize pipeline")?;
    let driver = BatchDriver::new(PackMatcher::new(), orchestrator);

    let (report, aborted) = match driver.run(&config.input_root).await {
        Ok(report) => (report, None),
        Err(aborted) => (aborted.report, Some(aborted.source)),
    };

    if report.failed_count() > 0 {
        warn!(
            failed = report.failed_count(),
            "Some titles were skipped, see log for details"
        );
    }

    // Also written when the batch aborted
    if let Some(path) = &config.report_path {
        write_report(&report, path)?;
    }

    if let Some(e) = aborted {
        return Err(anyhow::Error::new(e).context("Batch aborted"));
    }

    Ok(())
}

fn write_report(report: &BatchReport, path: &Path) -> Result<()> {
    let json = report.to_json().context("Failed to serialize batch report")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write report to {}", path.display()))?;
    info!(path = %path.display(), "Batch report written");
    Ok(())
}
