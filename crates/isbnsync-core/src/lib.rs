pub mod batch;
pub mod catalog;
pub mod dedup;
pub mod extract;
pub mod memory;
pub mod orchestrator;
pub mod progress;
pub mod reconcile;
pub mod tracker;

#[cfg(test)]
mod test_support;

pub use batch::{BatchFetcher, BatchOutcome, BatchStatus, FetchPolicy, RetryPolicy};
pub use catalog::CatalogQuery;
pub use dedup::{dedup_records, RecordSet};
pub use extract::extract_record;
pub use orchestrator::{BatchReport, Orchestrator, ReconcileOutcome, RunSummary};
pub use progress::{ProgressError, ProgressStore};
pub use reconcile::{ReconcileReport, Reconciler};
pub use tracker::ProgressTracker;
