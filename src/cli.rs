// src/cli.rs
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::batch::{BatchManager, BatchPaths};
use crate::catalog::Cataloger;
use crate::core::{ConfigManager, OpenAiBatchClient};
use crate::ledger::FileLedger;
use crate::orchestrator::{load_identifiers, WaveOrchestrator, WaveSettings};
use crate::scraping::PortalScraper;

#[derive(Parser, Debug)]
#[command(name = "job-analyzer")]
#[command(about = "Scrape job listings, analyze them with an LLM batch and catalog the results")]
pub struct AnalyzerCli {
    /// File with one job listing URL per line
    #[arg(short = 'f', long = "file")]
    pub file: PathBuf,

    /// Enable debug logging
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// YAML configuration file (defaults to ./config.yaml when present)
    #[arg(long, env = "JOB_ANALYZER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Also write JSON logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

pub async fn handle_analyze_command(cli: AnalyzerCli) -> Result<()> {
    let config = ConfigManager::load(cli.config.as_deref())?;
    config.ensure_directories().await?;

    let identifiers = load_identifiers(&cli.file).await?;
    info!(
        "Loaded {} job listings from {}",
        identifiers.len(),
        cli.file.display()
    );
    if identifiers.is_empty() {
        warn!("No job listings to process");
        return Ok(());
    }

    let provider = Arc::new(OpenAiBatchClient::new(&config.provider)?);
    let ledger = FileLedger::open(&config.paths.ledger_file).await?;
    let scraper = PortalScraper::new(&config.scraper)?;
    let cataloger = Cataloger::new(&config.paths.results_dir);
    cataloger.ensure_directories().await?;
    let batches = BatchManager::new(
        provider,
        BatchPaths::from(&config.paths),
        &config.provider,
    );

    let orchestrator = WaveOrchestrator::new(
        &ledger,
        &scraper,
        &batches,
        &cataloger,
        WaveSettings::from(&config.wave),
    );
    let summary = orchestrator.run(&identifiers).await?;

    info!(
        "Run complete: {} waves, {} cataloged, {} aborted, {} records written",
        summary.waves.len(),
        summary.cataloged_waves(),
        summary.aborted_waves(),
        summary.records_written()
    );
    Ok(())
}
