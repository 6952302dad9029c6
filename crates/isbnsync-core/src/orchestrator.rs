use crate::batch::{BatchFetcher, BatchStatus};
use crate::dedup::dedup_records;
use crate::memory::log_memory_usage;
use crate::progress::ProgressStore;
use crate::reconcile::{ReconcileReport, Reconciler};
use isbnsync_models::Batch;
use isbnsync_sources::{FetcherProvider, RecordStore};
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub name: String,
    pub records: usize,
    #[serde(flatten)]
    pub status: BatchStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Nothing was scraped, so nothing could be compared
    NoRecords,
    /// No record store was configured for this run
    NoStore,
    Completed(ReconcileReport),
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub batches: Vec<BatchReport>,
    /// Records across all batches before the cross-batch dedup
    pub total_fetched: usize,
    pub duplicates_removed: usize,
    pub unique_records: usize,
    pub reconcile: ReconcileOutcome,
    #[serde(skip)]
    pub duration: Duration,
}

impl RunSummary {
    pub fn update_count(&self) -> usize {
        match &self.reconcile {
            ReconcileOutcome::Completed(report) => report.updated,
            _ => 0,
        }
    }
}

/// Runs the configured batches in order, merges their records, writes the
/// consolidated file and reconciles the record store.
pub struct Orchestrator {
    batches: Vec<Batch>,
    fetcher: BatchFetcher,
    reconciler: Reconciler,
    progress: ProgressStore,
    consolidated_file: PathBuf,
}

impl Orchestrator {
    pub fn new(batches: Vec<Batch>, fetcher: BatchFetcher, reconciler: Reconciler, consolidated_file: PathBuf) -> Self {
        Self {
            batches,
            fetcher,
            reconciler,
            progress: ProgressStore::new(),
            consolidated_file,
        }
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub async fn run(&self, provider: &dyn FetcherProvider, store: Option<&dyn RecordStore>) -> RunSummary {
        let start = Instant::now();
        let mut all_records = Vec::new();
        let mut reports = Vec::with_capacity(self.batches.len());

        for (idx, batch) in self.batches.iter().enumerate() {
            info!(
                "=== Batch {}/{}: {} (pages {}-{}) ===",
                idx + 1,
                self.batches.len(),
                batch.display_name,
                batch.start_page,
                batch.end_page
            );
            log_memory_usage("batch start");

            let outcome = self.fetcher.run(batch, provider, &self.progress).await;
            if let BatchStatus::FetcherUnavailable { reason } = &outcome.status {
                warn!(
                    "Batch {} ran without a fetcher ({}); using {} saved records",
                    batch.display_name,
                    reason,
                    outcome.records.len()
                );
            }

            reports.push(BatchReport {
                name: batch.display_name.clone(),
                records: outcome.records.len(),
                status: outcome.status,
            });
            all_records.extend(outcome.records);
            log_memory_usage("batch end");
        }

        let total_fetched = all_records.len();
        let (unique, duplicates_removed) = dedup_records(all_records);
        info!(
            "Collected {} records, removed {} cross-batch duplicates, {} unique",
            total_fetched,
            duplicates_removed,
            unique.len()
        );

        if let Err(e) = self.progress.save(&self.consolidated_file, &unique) {
            error!("Failed to write consolidated file: {}", e);
        } else {
            info!("Wrote {} records to {:?}", unique.len(), self.consolidated_file);
        }

        let reconcile = match store {
            _ if unique.is_empty() => {
                warn!("No records collected; skipping reconciliation");
                ReconcileOutcome::NoRecords
            }
            None => {
                info!("No record store configured; skipping reconciliation");
                ReconcileOutcome::NoStore
            }
            Some(store) => match self.reconciler.reconcile(store, &unique).await {
                Ok(report) => {
                    info!("Reconciliation updated {} rows", report.updated);
                    ReconcileOutcome::Completed(report)
                }
                Err(e) => {
                    error!("Reconciliation against {} failed: {}", store.store_name(), e);
                    ReconcileOutcome::Failed { error: e.to_string() }
                }
            },
        };

        RunSummary {
            batches: reports,
            total_fetched,
            duplicates_removed,
            unique_records: unique.len(),
            reconcile,
            duration: start.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{FetchPolicy, RetryPolicy};
    use crate::catalog::CatalogQuery;
    use crate::test_support::{book_row, FakeCatalog, FakeSheet, PageScript};
    use isbnsync_models::Record;

    fn orchestrator(dir: &tempfile::TempDir, batches: Vec<Batch>) -> Orchestrator {
        let policy = FetchPolicy {
            retry: RetryPolicy {
                max_retries: 2,
                backoff_unit: Duration::ZERO,
            },
            ..FetchPolicy::default()
        };
        Orchestrator::new(
            batches,
            BatchFetcher::new(policy, CatalogQuery::new("https://catalog.test/List", 6, 1)),
            Reconciler::new("ISBN", Duration::ZERO),
            dir.path().join("all_books_complete.json"),
        )
    }

    fn batch(dir: &tempfile::TempDir, name: &str, language: &str, start: u32, end: u32) -> Batch {
        Batch {
            display_name: name.to_string(),
            language_code: language.to_string(),
            start_page: start,
            end_page: end,
            progress_file: dir.path().join(format!("{}.json", name)),
        }
    }

    #[tokio::test]
    async fn test_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let batches = vec![batch(&dir, "a", "1", 1, 2), batch(&dir, "b", "2", 1, 1)];
        let catalog = FakeCatalog::new()
            .page("1", 1, PageScript::Rows(vec![book_row("A", "1"), book_row("B", "2")]))
            .page("1", 2, PageScript::Rows(vec![book_row("A", "1")]))
            .page("2", 1, PageScript::Rows(vec![book_row("C", "3"), book_row("D", "4")]));
        let sheet = FakeSheet::new(&[("A", "1"), ("B", "old"), ("C", "3"), ("D", "")]);

        let summary = orchestrator(&dir, batches).run(&catalog, Some(&sheet)).await;

        assert_eq!(summary.total_fetched, 4);
        assert_eq!(summary.unique_records, 4);
        assert_eq!(summary.update_count(), 2);
        assert_eq!(sheet.isbn_at(3), "2");
        assert_eq!(sheet.isbn_at(5), "4");

        let consolidated = ProgressStore::new()
            .load(&dir.path().join("all_books_complete.json"))
            .unwrap();
        assert_eq!(
            consolidated,
            vec![
                Record::new("A", "1"),
                Record::new("B", "2"),
                Record::new("C", "3"),
                Record::new("D", "4")
            ]
        );
        assert_eq!(catalog.log().acquisitions, 2);
        assert_eq!(catalog.log().releases, 2);
    }

    #[tokio::test]
    async fn test_cross_batch_duplicates_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        let batches = vec![batch(&dir, "a", "1", 1, 1), batch(&dir, "b", "2", 1, 1)];
        let catalog = FakeCatalog::new()
            .page("1", 1, PageScript::Rows(vec![book_row("A", "1"), book_row("B", "2")]))
            .page("2", 1, PageScript::Rows(vec![book_row("B", "2"), book_row("C", "3")]));

        let summary = orchestrator(&dir, batches).run(&catalog, None).await;

        assert_eq!(summary.total_fetched, 4);
        assert_eq!(summary.duplicates_removed, 1);
        assert_eq!(summary.unique_records, 3);
        assert_eq!(summary.reconcile, ReconcileOutcome::NoStore);
    }

    #[tokio::test]
    async fn test_empty_run_skips_reconciliation() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = FakeCatalog::new();
        let sheet = FakeSheet::new(&[("A", "1")]);

        let summary = orchestrator(&dir, vec![batch(&dir, "a", "1", 1, 2)])
            .run(&catalog, Some(&sheet))
            .await;

        assert_eq!(summary.reconcile, ReconcileOutcome::NoRecords);
        assert_eq!(sheet.write_count(), 0);
    }

    #[tokio::test]
    async fn test_reconcile_error_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = FakeCatalog::new().page("1", 1, PageScript::Rows(vec![book_row("A", "1")]));
        let sheet = FakeSheet::without_isbn_column(&["A"]);

        let summary = orchestrator(&dir, vec![batch(&dir, "a", "1", 1, 1)])
            .run(&catalog, Some(&sheet))
            .await;

        assert!(matches!(summary.reconcile, ReconcileOutcome::Failed { .. }));
        assert_eq!(summary.unique_records, 1);
    }

    #[tokio::test]
    async fn test_unavailable_fetcher_does_not_stop_later_batches() {
        let dir = tempfile::tempdir().unwrap();
        let first = batch(&dir, "a", "1", 1, 3);
        ProgressStore::new()
            .save(&first.progress_file, &[Record::new("Saved", "0")])
            .unwrap();
        let catalog = FakeCatalog::new().failing_to_start();

        let summary = orchestrator(&dir, vec![first, batch(&dir, "b", "2", 1, 1)])
            .run(&catalog, None)
            .await;

        assert_eq!(summary.batches.len(), 2);
        assert!(matches!(summary.batches[0].status, BatchStatus::FetcherUnavailable { .. }));
        assert_eq!(summary.unique_records, 1);
    }
}
