pub mod traits;
pub mod error;
pub mod table;
pub mod chromium;
pub mod sheets;
pub mod csv_store;
pub mod factory;

pub use traits::{FetcherProvider, PageFetcher, RecordStore, Row};
pub use error::{FetchError, FetcherInitError, StoreError};
pub use chromium::{ChromiumFetcher, ChromiumOptions, ChromiumProvider};
pub use sheets::{SheetsAuth, SheetsStore};
pub use csv_store::CsvStore;
pub use factory::create_store;
