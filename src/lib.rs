pub mod batch;
pub mod catalog;
pub mod cli;
pub mod core;
pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod scraping;
pub mod types;
pub mod utils;

#[cfg(test)]
mod testing;

pub use error::AnalyzerError;
pub use orchestrator::{RunSummary, WaveOrchestrator, WaveOutcome};
