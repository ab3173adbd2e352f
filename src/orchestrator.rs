// src/orchestrator.rs
//! Drives input identifiers through scrape → batch → catalog, one wave at a time

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::batch::{BatchJob, BatchManager};
use crate::catalog::Cataloger;
use crate::core::config_manager::WaveConfig;
use crate::error::{AnalyzerError, CatalogError};
use crate::ledger::Ledger;
use crate::scraping::{message_identifier, to_message, TextSource};
use crate::types::Message;

#[derive(Debug, Clone)]
pub struct WaveSettings {
    pub wave_size: usize,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
}

impl From<&WaveConfig> for WaveSettings {
    fn from(config: &WaveConfig) -> Self {
        Self {
            wave_size: config.wave_size,
            poll_interval: config.poll_interval(),
            max_poll_attempts: config.max_poll_attempts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaveOutcome {
    /// Results written and every included identifier ledgered
    Cataloged { records: usize, rejected_rows: usize },
    /// No listing in the wave produced text worth submitting
    NothingToSubmit,
    /// Submission, polling, download or cataloging failed; nothing ledgered
    Aborted(String),
}

#[derive(Debug, Clone)]
pub struct WaveReport {
    pub number: usize,
    pub listings: usize,
    pub skipped: usize,
    pub successful: usize,
    pub failed: usize,
    pub empty: usize,
    /// Batch from an earlier run that this wave picked up instead of scraping
    pub resumed_batch: Option<String>,
    pub outcome: WaveOutcome,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub waves: Vec<WaveReport>,
}

impl RunSummary {
    pub fn cataloged_waves(&self) -> usize {
        self.waves
            .iter()
            .filter(|wave| matches!(wave.outcome, WaveOutcome::Cataloged { .. }))
            .count()
    }

    pub fn aborted_waves(&self) -> usize {
        self.waves
            .iter()
            .filter(|wave| matches!(wave.outcome, WaveOutcome::Aborted(_)))
            .count()
    }

    pub fn records_written(&self) -> usize {
        self.waves
            .iter()
            .map(|wave| match wave.outcome {
                WaveOutcome::Cataloged { records, .. } => records,
                _ => 0,
            })
            .sum()
    }
}

pub struct WaveOrchestrator<'a> {
    ledger: &'a dyn Ledger,
    source: &'a dyn TextSource,
    batches: &'a BatchManager,
    cataloger: &'a Cataloger,
    settings: WaveSettings,
}

impl<'a> WaveOrchestrator<'a> {
    pub fn new(
        ledger: &'a dyn Ledger,
        source: &'a dyn TextSource,
        batches: &'a BatchManager,
        cataloger: &'a Cataloger,
        settings: WaveSettings,
    ) -> Self {
        Self {
            ledger,
            source,
            batches,
            cataloger,
            settings,
        }
    }

    /// Process `identifiers` in fixed-size waves. A failed wave is reported
    /// and the run moves on; only fatal errors stop it.
    pub async fn run(&self, identifiers: &[String]) -> Result<RunSummary, AnalyzerError> {
        let mut summary = RunSummary::default();

        for (index, wave) in identifiers.chunks(self.settings.wave_size.max(1)).enumerate() {
            let number = index + 1;
            info!("Processing wave {} with {} listings", number, wave.len());
            let report = self.process_wave(number, wave).await?;
            summary.waves.push(report);
        }

        let leftover = self.batches.pending().await?.len();
        if leftover > 0 {
            warn!(
                "{} batches from this or earlier runs are still pending under {}",
                leftover,
                self.batches.object_dir().display()
            );
        }

        Ok(summary)
    }

    pub async fn process_wave(
        &self,
        number: usize,
        wave: &[String],
    ) -> Result<WaveReport, AnalyzerError> {
        let mut report = WaveReport {
            number,
            listings: wave.len(),
            skipped: 0,
            successful: 0,
            failed: 0,
            empty: 0,
            resumed_batch: None,
            outcome: WaveOutcome::NothingToSubmit,
        };

        let mut candidates: Vec<&str> = Vec::new();
        for uri in wave {
            if candidates.contains(&uri.as_str()) || self.ledger.has(uri).await? {
                warn!("Skipping {}: Already processed", uri);
                report.skipped += 1;
                continue;
            }
            candidates.push(uri);
        }

        if let Some((job, identifiers)) = self.pending_batch(&candidates).await? {
            info!(
                "Resuming batch {} from an earlier run covering {} listings",
                job.id(),
                identifiers.len()
            );
            let deferred = candidates.len().saturating_sub(identifiers.len());
            if deferred > 0 {
                info!(
                    "{} listings of wave {} are left for the next run",
                    deferred, number
                );
            }
            report.resumed_batch = Some(job.id().to_string());
            let result = self.complete(job).await;
            return self.settle(report, &identifiers, result).await;
        }

        let mut messages = Vec::new();
        let mut included = Vec::new();
        for uri in candidates {
            match self.source.fetch_text(uri).await {
                Ok(text) if text.trim().is_empty() => {
                    warn!("Skipping {}: Empty job description", uri);
                    report.empty += 1;
                }
                Ok(text) => {
                    messages.push(to_message(uri, &text));
                    included.push(uri.to_string());
                    report.successful += 1;
                    info!("Successfully processed job listing: {}", uri);
                }
                Err(e) => {
                    error!("Failed to process {}: {:#}", uri, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Processing summary: {} successful, {} failed, {} empty",
            report.successful, report.failed, report.empty
        );

        if messages.is_empty() {
            info!("No valid job descriptions found in wave {}", number);
            return Ok(report);
        }

        let result = self.submit(messages).await;
        self.settle(report, &included, result).await
    }

    /// A batch left behind by an earlier run whose listings all belong to
    /// `candidates`, together with those listings.
    async fn pending_batch(
        &self,
        candidates: &[&str],
    ) -> Result<Option<(BatchJob, Vec<String>)>, AnalyzerError> {
        if candidates.is_empty() {
            return Ok(None);
        }

        for job in self.batches.pending().await? {
            let identifiers: Vec<String> = self
                .batches
                .request_messages(&job)
                .await?
                .iter()
                .filter_map(message_identifier)
                .map(String::from)
                .collect();

            if !identifiers.is_empty()
                && identifiers
                    .iter()
                    .all(|id| candidates.contains(&id.as_str()))
            {
                return Ok(Some((job, identifiers)));
            }
        }
        Ok(None)
    }

    /// Ledger `included` if the wave's batch was cataloged. The ledger is
    /// written in one append after every record is on disk.
    async fn settle(
        &self,
        mut report: WaveReport,
        included: &[String],
        result: Result<(Vec<PathBuf>, usize), AnalyzerError>,
    ) -> Result<WaveReport, AnalyzerError> {
        match result {
            Ok((records, rejected_rows)) => {
                self.ledger.record_all(included).await?;
                info!(
                    "Wave {} cataloged {} postings, {} listings marked as processed",
                    report.number,
                    records.len(),
                    included.len()
                );
                report.outcome = WaveOutcome::Cataloged {
                    records: records.len(),
                    rejected_rows,
                };
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                error!(
                    "Wave {} aborted, its {} listings stay unprocessed: {}",
                    report.number,
                    included.len(),
                    e
                );
                report.outcome = WaveOutcome::Aborted(e.to_string());
            }
        }

        Ok(report)
    }

    async fn submit(&self, messages: Vec<Message>) -> Result<(Vec<PathBuf>, usize), AnalyzerError> {
        info!("Submitting batch with {} job descriptions", messages.len());

        let mut job = self.batches.create(messages).await?;
        self.batches.submit(&mut job).await?;
        self.complete(job).await
    }

    async fn complete(&self, mut job: BatchJob) -> Result<(Vec<PathBuf>, usize), AnalyzerError> {
        self.batches
            .wait_for_completion(
                &mut job,
                self.settings.poll_interval,
                self.settings.max_poll_attempts,
            )
            .await?;
        let text = self.batches.fetch_results(&mut job).await?;

        let parsed = Cataloger::parse(&text)?;
        if parsed.postings.is_empty() {
            return Err(CatalogError::NoValidRows {
                rejected: parsed.rejected.len(),
            }
            .into());
        }

        let records = self.cataloger.catalog(&parsed.postings).await?;
        Ok((records, parsed.rejected.len()))
    }
}

/// Read newline-delimited identifiers, trimming whitespace and dropping blank lines
pub async fn load_identifiers(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config_manager::ProviderConfig;
    use crate::ledger::FileLedger;
    use crate::testing::{batch_paths, fenced, posting, provider_output, FakeProvider, FakeSource};
    use crate::types::BatchStatus;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        provider: Arc<FakeProvider>,
        ledger: FileLedger,
        batches: BatchManager,
        cataloger: Cataloger,
    }

    impl Fixture {
        async fn new(provider: FakeProvider) -> Self {
            let dir = TempDir::new().unwrap();
            let provider = Arc::new(provider);
            let ledger = FileLedger::open(dir.path().join("memory").join("analyzed_uris.txt"))
                .await
                .unwrap();
            let batches = BatchManager::new(
                provider.clone(),
                batch_paths(dir.path()),
                &ProviderConfig::default(),
            );
            let cataloger = Cataloger::new(dir.path().join("results"));
            Self {
                dir,
                provider,
                ledger,
                batches,
                cataloger,
            }
        }

        fn orchestrator<'a>(&'a self, source: &'a FakeSource, wave_size: usize) -> WaveOrchestrator<'a> {
            self.orchestrator_polling(source, wave_size, 3)
        }

        fn orchestrator_polling<'a>(
            &'a self,
            source: &'a FakeSource,
            wave_size: usize,
            max_poll_attempts: u32,
        ) -> WaveOrchestrator<'a> {
            WaveOrchestrator::new(
                &self.ledger,
                source,
                &self.batches,
                &self.cataloger,
                WaveSettings {
                    wave_size,
                    poll_interval: Duration::ZERO,
                    max_poll_attempts,
                },
            )
        }

        fn ledger_content(&self) -> String {
            std::fs::read_to_string(self.ledger.path()).unwrap()
        }

        fn records(&self) -> Vec<PathBuf> {
            let mut records = Vec::new();
            let root = self.dir.path().join("results");
            if let Ok(buckets) = std::fs::read_dir(root) {
                for bucket in buckets.flatten() {
                    if let Ok(files) = std::fs::read_dir(bucket.path()) {
                        records.extend(files.flatten().map(|file| file.path()));
                    }
                }
            }
            records.sort();
            records
        }
    }

    fn ids(uris: &[&str]) -> Vec<String> {
        uris.iter().map(|uri| uri.to_string()).collect()
    }

    fn two_postings() -> String {
        provider_output(&fenced(&json!([
            posting("CYBERSECURITY", "SOC Analyst", "https://a/1"),
            posting("IT_SUPPORT", "Helpdesk", "https://a/2"),
        ])))
    }

    #[tokio::test]
    async fn test_wave_is_cataloged_and_rerun_is_idempotent() {
        let fixture = Fixture::new(FakeProvider::completing(two_postings())).await;
        let source = FakeSource::default()
            .with_page("https://a/1", "Security analyst wanted")
            .with_page("https://a/2", "Helpdesk student job");
        let input = ids(&["https://a/1", "https://a/2"]);

        let summary = fixture.orchestrator(&source, 10).run(&input).await.unwrap();
        assert_eq!(summary.cataloged_waves(), 1);
        assert_eq!(summary.records_written(), 2);

        let results = fixture.dir.path().join("results");
        assert_eq!(
            fixture.records(),
            vec![
                results.join("cybersecurity").join("03_02_2025_SOC_Analyst.json"),
                results.join("it_support").join("03_02_2025_Helpdesk.json"),
            ]
        );
        assert_eq!(fixture.ledger_content(), "https://a/1\nhttps://a/2\n");

        let uploaded = fixture.provider.uploads();
        assert!(uploaded[0].contains("Security analyst wanted"));
        assert!(uploaded[0].contains("Helpdesk student job"));

        let rerun = fixture.orchestrator(&source, 10).run(&input).await.unwrap();
        assert_eq!(rerun.waves[0].skipped, 2);
        assert_eq!(rerun.waves[0].outcome, WaveOutcome::NothingToSubmit);
        assert_eq!(fixture.provider.batches_created(), 1);
        assert_eq!(source.fetches(), 2);
        assert_eq!(fixture.records().len(), 2);
        assert_eq!(fixture.ledger_content(), "https://a/1\nhttps://a/2\n");
    }

    #[tokio::test]
    async fn test_empty_and_failed_listings_are_not_ledgered() {
        let output = provider_output(&fenced(&json!([posting("OTHER", "Clerk", "https://a/1")])));
        let fixture = Fixture::new(FakeProvider::completing(output)).await;
        let source = FakeSource::default()
            .with_page("https://a/1", "Office clerk")
            .with_page("https://a/2", "   ");

        let summary = fixture
            .orchestrator(&source, 10)
            .run(&ids(&["https://a/1", "https://a/2", "https://a/3"]))
            .await
            .unwrap();

        let wave = &summary.waves[0];
        assert_eq!((wave.successful, wave.empty, wave.failed), (1, 1, 1));
        assert_eq!(
            wave.outcome,
            WaveOutcome::Cataloged {
                records: 1,
                rejected_rows: 0
            }
        );
        assert_eq!(fixture.ledger_content(), "https://a/1\n");
    }

    #[tokio::test]
    async fn test_wave_without_text_submits_nothing() {
        let fixture = Fixture::new(FakeProvider::completing(two_postings())).await;
        let source = FakeSource::default().with_page("https://a/1", "");

        let summary = fixture
            .orchestrator(&source, 10)
            .run(&ids(&["https://a/1", "https://a/2"]))
            .await
            .unwrap();

        assert_eq!(summary.waves[0].outcome, WaveOutcome::NothingToSubmit);
        assert_eq!(fixture.provider.batches_created(), 0);
        assert_eq!(fixture.ledger_content(), "");
    }

    #[tokio::test]
    async fn test_failed_batch_aborts_only_its_wave() {
        let output = provider_output(&fenced(&json!([posting("OTHER", "Clerk", "https://a/2")])));
        let provider = FakeProvider::new(vec![BatchStatus::Failed, BatchStatus::Completed], output);
        let fixture = Fixture::new(provider).await;
        let source = FakeSource::default()
            .with_page("https://a/1", "first")
            .with_page("https://a/2", "second");

        let summary = fixture
            .orchestrator(&source, 1)
            .run(&ids(&["https://a/1", "https://a/2"]))
            .await
            .unwrap();

        assert_eq!(summary.waves.len(), 2);
        assert!(matches!(summary.waves[0].outcome, WaveOutcome::Aborted(_)));
        assert!(matches!(summary.waves[1].outcome, WaveOutcome::Cataloged { .. }));
        assert_eq!(summary.aborted_waves(), 1);
        assert_eq!(fixture.ledger_content(), "https://a/2\n");
    }

    #[tokio::test]
    async fn test_timed_out_batch_is_resumed_on_rerun() {
        let output = provider_output(&fenced(&json!([posting("OTHER", "Clerk", "https://a/1")])));
        let provider = FakeProvider::new(vec![BatchStatus::InProgress, BatchStatus::Completed], output);
        let fixture = Fixture::new(provider).await;
        let source = FakeSource::default().with_page("https://a/1", "Office clerk");
        let input = ids(&["https://a/1"]);

        let first = fixture
            .orchestrator_polling(&source, 10, 1)
            .run(&input)
            .await
            .unwrap();
        assert!(matches!(first.waves[0].outcome, WaveOutcome::Aborted(_)));
        assert_eq!(fixture.ledger_content(), "");
        assert_eq!(fixture.batches.pending().await.unwrap().len(), 1);

        let second = fixture
            .orchestrator_polling(&source, 10, 1)
            .run(&input)
            .await
            .unwrap();
        assert!(second.waves[0].resumed_batch.is_some());
        assert_eq!(
            second.waves[0].outcome,
            WaveOutcome::Cataloged {
                records: 1,
                rejected_rows: 0
            }
        );
        assert_eq!(fixture.provider.batches_created(), 1);
        assert_eq!(source.fetches(), 1);
        assert_eq!(fixture.ledger_content(), "https://a/1\n");
        assert!(fixture.batches.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pending_batch_for_other_listings_is_left_alone() {
        let output = provider_output(&fenced(&json!([posting("OTHER", "Clerk", "https://a/2")])));
        let provider = FakeProvider::new(vec![BatchStatus::InProgress, BatchStatus::Completed], output);
        let fixture = Fixture::new(provider).await;
        let source = FakeSource::default()
            .with_page("https://a/1", "first")
            .with_page("https://a/2", "second");

        fixture
            .orchestrator_polling(&source, 10, 1)
            .run(&ids(&["https://a/1"]))
            .await
            .unwrap();
        let summary = fixture
            .orchestrator_polling(&source, 10, 1)
            .run(&ids(&["https://a/2"]))
            .await
            .unwrap();

        assert!(summary.waves[0].resumed_batch.is_none());
        assert!(matches!(summary.waves[0].outcome, WaveOutcome::Cataloged { .. }));
        assert_eq!(fixture.provider.batches_created(), 2);
        assert_eq!(fixture.ledger_content(), "https://a/2\n");
        assert_eq!(fixture.batches.pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_catalog_failure_leaves_wave_unledgered() {
        let fixture = Fixture::new(FakeProvider::completing(two_postings())).await;
        let results = fixture.dir.path().join("results");
        std::fs::create_dir_all(&results).unwrap();
        std::fs::write(results.join("it_support"), "not a directory").unwrap();
        let source = FakeSource::default()
            .with_page("https://a/1", "first")
            .with_page("https://a/2", "second");

        let summary = fixture
            .orchestrator(&source, 10)
            .run(&ids(&["https://a/1", "https://a/2"]))
            .await
            .unwrap();

        assert!(matches!(summary.waves[0].outcome, WaveOutcome::Aborted(_)));
        assert!(results
            .join("cybersecurity")
            .join("03_02_2025_SOC_Analyst.json")
            .exists());
        assert_eq!(fixture.ledger_content(), "");
    }

    #[tokio::test]
    async fn test_provider_rejection_is_not_fatal() {
        let provider = FakeProvider::completing(two_postings()).rejecting_create();
        let fixture = Fixture::new(provider).await;
        let source = FakeSource::default().with_page("https://a/1", "first");

        let summary = fixture
            .orchestrator(&source, 10)
            .run(&ids(&["https://a/1"]))
            .await
            .unwrap();

        match &summary.waves[0].outcome {
            WaveOutcome::Aborted(reason) => assert!(reason.contains("Rate limit")),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(fixture.ledger_content(), "");
    }

    #[tokio::test]
    async fn test_answer_without_valid_rows_is_not_ledgered() {
        let output = provider_output(&fenced(&json!([{"type": "OTHER"}])));
        let fixture = Fixture::new(FakeProvider::completing(output)).await;
        let source = FakeSource::default().with_page("https://a/1", "first");

        let summary = fixture
            .orchestrator(&source, 10)
            .run(&ids(&["https://a/1"]))
            .await
            .unwrap();

        assert!(matches!(summary.waves[0].outcome, WaveOutcome::Aborted(_)));
        assert_eq!(fixture.ledger_content(), "");
    }

    #[tokio::test]
    async fn test_unreadable_ledger_stops_the_run() {
        let fixture = Fixture::new(FakeProvider::completing(two_postings())).await;
        std::fs::remove_file(fixture.ledger.path()).unwrap();
        std::fs::create_dir(fixture.ledger.path()).unwrap();
        let source = FakeSource::default().with_page("https://a/1", "first");

        let err = fixture
            .orchestrator(&source, 10)
            .run(&ids(&["https://a/1"]))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(fixture.provider.batches_created(), 0);
    }

    #[tokio::test]
    async fn test_load_identifiers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("input.txt");
        std::fs::write(&path, "  https://a/1  \n\nhttps://a/2\r\n").unwrap();

        let identifiers = load_identifiers(&path).await.unwrap();
        assert_eq!(identifiers, vec!["https://a/1", "https://a/2"]);
        assert!(load_identifiers(&dir.path().join("missing.txt")).await.is_err());
    }
}
