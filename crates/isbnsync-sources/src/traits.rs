use crate::error::{FetchError, FetcherInitError, StoreError};
use async_trait::async_trait;
use isbnsync_models::{ColumnId, StoreRow};
use std::time::Duration;

/// Text of one rendered table row, cell by cell.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    pub cells: Vec<String>,
}

impl Row {
    pub fn new<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cells: cells.into_iter().map(Into::into).collect(),
        }
    }
}

/// Renders a catalog page and hands back its table rows.
#[async_trait]
pub trait PageFetcher: Send {
    fn fetcher_name(&self) -> &str;

    /// Navigate to `url` and block until an element matching `render_wait_selector`
    /// exists (or `render_timeout` elapses), then return the matching rows.
    async fn fetch_rows(
        &mut self,
        url: &str,
        render_wait_selector: &str,
        render_timeout: Duration,
    ) -> Result<Vec<Row>, FetchError>;

    // Called once when the batch that acquired this fetcher ends, on every exit path.
    // Must not fail; problems are logged by the implementation.
    async fn release(&mut self) {}
}

/// Hands out a fresh fetcher per batch.
#[async_trait]
pub trait FetcherProvider: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn PageFetcher>, FetcherInitError>;
}

/// The spreadsheet of book records being corrected.
#[async_trait]
pub trait RecordStore: Send + Sync {
    fn store_name(&self) -> &str;

    /// Cheap reachability/credentials check, run before any scraping starts
    async fn verify(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Data rows in sheet order, with their 1-based sheet row index
    async fn list_rows(&self) -> Result<Vec<StoreRow>, StoreError>;

    async fn find_column(&self, header: &str) -> Result<ColumnId, StoreError>;

    async fn update_cell(&self, row_index: usize, column: ColumnId, value: &str) -> Result<(), StoreError>;
}
