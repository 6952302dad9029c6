use crate::catalog::CatalogQuery;
use crate::dedup::RecordSet;
use crate::extract::extract_record;
use crate::progress::ProgressStore;
use crate::tracker::ProgressTracker;
use isbnsync_config::{CatalogConfig, FetchConfig};
use isbnsync_models::{Batch, Record};
use isbnsync_sources::{FetcherProvider, PageFetcher, Row};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};


/// Bounded retries with linearly growing backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_unit: Duration,
}

impl RetryPolicy {
    /// Sleep before retrying after failed attempt `attempt` (1-based)
    pub fn backoff_before_retry(&self, attempt: u32) -> Duration {
        self.backoff_unit * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_unit: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub avg_records_per_page: u32,
    /// Fraction of the expected record count at which a batch counts as done
    pub completion_threshold: f64,
    /// Persist after every N-th page of a batch
    pub checkpoint_interval: u32,
    pub retry: RetryPolicy,
    pub row_selector: String,
    pub render_timeout: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            avg_records_per_page: 8,
            completion_threshold: 0.7,
            checkpoint_interval: 3,
            retry: RetryPolicy::default(),
            row_selector: "table tbody tr".to_string(),
            render_timeout: Duration::from_secs(15),
        }
    }
}

impl FetchPolicy {
    pub fn from_config(catalog: &CatalogConfig, fetch: &FetchConfig) -> Self {
        Self {
            avg_records_per_page: fetch.avg_records_per_page,
            completion_threshold: fetch.completion_threshold,
            checkpoint_interval: fetch.checkpoint_interval,
            retry: RetryPolicy {
                max_retries: fetch.max_retries,
                backoff_unit: Duration::from_secs(fetch.backoff_unit_seconds),
            },
            row_selector: catalog.row_selector.clone(),
            render_timeout: Duration::from_secs(catalog.render_timeout_seconds),
        }
    }

    pub fn expected_records(&self, batch: &Batch) -> usize {
        batch.page_count() as usize * self.avg_records_per_page as usize
    }

    /// A batch with no expected records is never complete
    pub fn is_complete(&self, have: usize, expected: usize) -> bool {
        expected > 0 && have as f64 / expected as f64 >= self.completion_threshold
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchStatus {
    /// Enough records were already on disk; no page was fetched
    AlreadyComplete,
    /// No fetcher could be started; the on-disk records were returned
    FetcherUnavailable { reason: String },
    Fetched {
        pages_ok: u32,
        pages_failed: u32,
        new_records: usize,
    },
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub records: Vec<Record>,
    pub status: BatchStatus,
}

/// Owns a batch's accumulator and writes it out once more when dropped,
/// so an early return, panic or cancelled future still leaves the progress
/// file current. [`finish`](Self::finish) does that final save on the
/// normal path and hands the records over.
struct Checkpoint<'a> {
    store: &'a ProgressStore,
    path: &'a Path,
    records: RecordSet,
    finished: bool,
}

impl<'a> Checkpoint<'a> {
    fn new(store: &'a ProgressStore, path: &'a Path, records: RecordSet) -> Self {
        Self {
            store,
            path,
            records,
            finished: false,
        }
    }

    fn insert(&mut self, record: Record) -> bool {
        self.records.insert(record)
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn save(&self) -> bool {
        match self.store.save(self.path, self.records.as_slice()) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to save progress: {}", e);
                false
            }
        }
    }

    fn finish(mut self) -> Vec<Record> {
        self.finished = true;
        if self.save() {
            info!("Saved {} records to {:?}", self.records.len(), self.path);
        }
        std::mem::take(&mut self.records).into_records()
    }
}

impl Drop for Checkpoint<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Batch interrupted; saving {} records to {:?}", self.records.len(), self.path);
            self.save();
        }
    }
}

#[derive(Debug, Default)]
struct PageCounts {
    ok: u32,
    failed: u32,
    new_records: usize,
}

/// Runs one batch: resume from disk, fetch the page range, persist.
pub struct BatchFetcher {
    policy: FetchPolicy,
    catalog: CatalogQuery,
}

impl BatchFetcher {
    pub fn new(policy: FetchPolicy, catalog: CatalogQuery) -> Self {
        Self { policy, catalog }
    }

    /// Fetch `batch` and return its full record set (saved plus new).
    ///
    /// A fetcher is only acquired when the saved records fall short of the
    /// completion threshold; it is released before this returns. Page and
    /// row failures are logged and skipped, never returned.
    #[instrument(skip_all, fields(batch = %batch.display_name))]
    pub async fn run(&self, batch: &Batch, provider: &dyn FetcherProvider, store: &ProgressStore) -> BatchOutcome {
        let expected = self.policy.expected_records(batch);
        let existing = store.load_or_empty(&batch.progress_file);

        if self.policy.is_complete(existing.len(), expected) {
            info!(
                "Already complete: {} of ~{} expected records on disk, skipping",
                existing.len(),
                expected
            );
            return BatchOutcome {
                records: existing,
                status: BatchStatus::AlreadyComplete,
            };
        }

        info!(
            "Fetching pages {}-{} (language {}), {} records on disk",
            batch.start_page,
            batch.end_page,
            batch.language_code,
            existing.len()
        );

        let mut fetcher = match provider.acquire().await {
            Ok(fetcher) => fetcher,
            Err(e) => {
                error!("Could not start a page fetcher: {}", e);
                return BatchOutcome {
                    records: existing,
                    status: BatchStatus::FetcherUnavailable { reason: e.to_string() },
                };
            }
        };
        debug!("Acquired {} fetcher", fetcher.fetcher_name());

        let mut checkpoint = Checkpoint::new(store, &batch.progress_file, RecordSet::from_records(existing));
        let counts = self.fetch_pages(batch, fetcher.as_mut(), &mut checkpoint).await;
        fetcher.release().await;
        let records = checkpoint.finish();

        info!(
            "Batch done: {} pages ok, {} failed, {} new records, {} total",
            counts.ok,
            counts.failed,
            counts.new_records,
            records.len()
        );

        BatchOutcome {
            records,
            status: BatchStatus::Fetched {
                pages_ok: counts.ok,
                pages_failed: counts.failed,
                new_records: counts.new_records,
            },
        }
    }

    async fn fetch_pages(
        &self,
        batch: &Batch,
        fetcher: &mut dyn PageFetcher,
        checkpoint: &mut Checkpoint<'_>,
    ) -> PageCounts {
        let mut counts = PageCounts::default();
        let mut tracker = ProgressTracker::new(batch.page_count() as usize, "pages", 10);
        let interval = self.policy.checkpoint_interval.max(1);

        for (processed, page) in (1u32..).zip(batch.pages()) {
            let url = self.catalog.page_url(&batch.language_code, page);

            match self.fetch_page(fetcher, &url, page).await {
                Some(rows) => {
                    let mut added = 0;
                    for record in rows.iter().filter_map(extract_record) {
                        if checkpoint.insert(record) {
                            added += 1;
                        }
                    }
                    counts.ok += 1;
                    counts.new_records += added;
                    tracker.record_succeeded();
                    info!(page, "Page {}: {} new records ({} total)", page, added, checkpoint.len());
                }
                None => {
                    counts.failed += 1;
                    tracker.record_failed_with_error("fetch");
                }
            }

            if processed % interval == 0 && checkpoint.save() {
                debug!(page, "Checkpoint: {} records saved", checkpoint.len());
            }
            tracker.log_progress(processed as usize);
        }

        tracker.log_summary(&format!("Batch {}", batch.display_name));
        counts
    }

    /// Rows of one page, or `None` once every attempt has failed
    async fn fetch_page(&self, fetcher: &mut dyn PageFetcher, url: &str, page: u32) -> Option<Vec<Row>> {
        let retry = &self.policy.retry;

        for attempt in 1..=retry.max_retries {
            match fetcher
                .fetch_rows(url, &self.policy.row_selector, self.policy.render_timeout)
                .await
            {
                Ok(rows) => return Some(rows),
                Err(e) => {
                    warn!(page, attempt, "Attempt {}/{} failed: {}", attempt, retry.max_retries, e);
                    if attempt < retry.max_retries {
                        sleep(retry.backoff_before_retry(attempt)).await;
                    }
                }
            }
        }

        error!(page, "Giving up on page {} after {} attempts", page, retry.max_retries);
        None
    }
}
