use crate::tracker::ProgressTracker;
use isbnsync_models::Record;
use isbnsync_sources::{RecordStore, StoreError};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub rows_checked: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Writes scraped ISBNs over stale ones in the record store.
pub struct Reconciler {
    isbn_header: String,
    rate_limit_delay: Duration,
}

impl Reconciler {
    pub fn new(isbn_header: impl Into<String>, rate_limit_delay: Duration) -> Self {
        Self {
            isbn_header: isbn_header.into(),
            rate_limit_delay,
        }
    }

    /// Correct every row whose name matches a record but whose stored ISBN differs.
    ///
    /// A missing ISBN column or an unreadable store aborts the pass. A failed
    /// cell write is logged and counted; later rows are still processed and
    /// earlier writes stay applied.
    #[instrument(skip_all, fields(store = store.store_name()))]
    pub async fn reconcile(&self, store: &dyn RecordStore, records: &[Record]) -> Result<ReconcileReport, StoreError> {
        let isbn_column = store.find_column(&self.isbn_header).await?;
        let rows = store.list_rows().await?;
        let index = name_index(records);
        info!(
            "Checking {} sheet rows against {} scraped records (ISBN column {})",
            rows.len(),
            index.len(),
            isbn_column
        );

        let mut report = ReconcileReport::default();
        let mut tracker = ProgressTracker::new(rows.len(), "rows", 100);

        for (idx, row) in rows.iter().enumerate() {
            report.rows_checked += 1;

            match index.get(row.display_name.as_str()) {
                Some(isbn) if *isbn != row.stored_isbn.trim() => {
                    match store.update_cell(row.row_index, isbn_column, isbn).await {
                        Ok(()) => {
                            report.updated += 1;
                            tracker.record_succeeded();
                            info!(
                                row = row.row_index,
                                "Updated '{}': {} -> {}",
                                row.display_name,
                                row.stored_isbn.trim(),
                                isbn
                            );
                        }
                        Err(e) => {
                            report.failed += 1;
                            tracker.record_failed_with_error("write");
                            error!(row = row.row_index, "Failed to update '{}': {}", row.display_name, e);
                        }
                    }
                    sleep(self.rate_limit_delay).await;
                }
                Some(_) => tracker.record_unchanged(),
                None => debug!(row = row.row_index, "No scraped record named '{}'", row.display_name),
            }

            tracker.log_progress(idx + 1);
        }

        tracker.log_summary("Reconciliation");
        Ok(report)
    }
}

/// name -> isbn, keeping the first record seen for each name
fn name_index(records: &[Record]) -> HashMap<&str, &str> {
    let mut index = HashMap::with_capacity(records.len());
    for record in records {
        index.entry(record.name.as_str()).or_insert(record.isbn.as_str());
    }
    index
}
