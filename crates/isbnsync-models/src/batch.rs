use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A contiguous page range of one language partition of the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Batch {
    /// Human-readable label used in logs and summaries
    pub display_name: String,
    /// Value of the catalog's `PlanetLanguage` parameter ("1" = Chinese, "2" = English)
    pub language_code: String,
    pub start_page: u32,
    pub end_page: u32,
    /// Progress file owned exclusively by this batch
    pub progress_file: PathBuf,
}

impl Batch {
    /// Number of pages in the inclusive range, 0 for an inverted range
    pub fn page_count(&self) -> u32 {
        if self.end_page < self.start_page {
            0
        } else {
            self.end_page - self.start_page + 1
        }
    }

    pub fn pages(&self) -> std::ops::RangeInclusive<u32> {
        self.start_page..=self.end_page
    }
}
