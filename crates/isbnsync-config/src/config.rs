use crate::paths::PathManager;
use isbnsync_models::Batch;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub sheet: SheetConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default = "default_batches")]
    pub batches: Vec<BatchConfig>,
}

/// Where the book list lives and how its table is rendered
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CatalogConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_book_type")]
    pub book_type: u32,
    #[serde(default = "default_book_sort")]
    pub book_sort: u32,
    /// CSS selector whose presence means the table has rendered
    #[serde(default = "default_row_selector")]
    pub row_selector: String,
    #[serde(default = "default_render_timeout_seconds")]
    pub render_timeout_seconds: u64,
    /// Extra wait after the selector appears, for client-side templating to fill cells
    #[serde(default = "default_settle_millis")]
    pub settle_millis: u64,
    /// Run Chromium headless
    #[serde(default = "default_true")]
    pub headless: bool,
}

/// Retry, checkpoint and completion tunables for a batch run
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff before retry `i` is `i * backoff_unit_seconds`
    #[serde(default = "default_backoff_unit_seconds")]
    pub backoff_unit_seconds: u64,
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: u32,
    #[serde(default = "default_avg_records_per_page")]
    pub avg_records_per_page: u32,
    #[serde(default = "default_completion_threshold")]
    pub completion_threshold: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Google Sheets v4 REST API
    Google,
    /// Local CSV export of the sheet
    Csv,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SheetConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
    /// Spreadsheet URL (https://docs.google.com/spreadsheets/d/<id>/...)
    #[serde(default)]
    pub url: String,
    /// Worksheet title; the first sheet is used when unset
    #[serde(default)]
    pub worksheet: Option<String>,
    /// Service account JSON key; defaults to service_account.json in the config directory
    #[serde(default)]
    pub service_account_key: Option<PathBuf>,
    /// Credentials file that may hold a static `google_sheets_access_token`
    /// overriding the service account; defaults to credentials.toml
    #[serde(default)]
    pub credentials_file: Option<PathBuf>,
    #[serde(default)]
    pub csv_path: Option<PathBuf>,
    #[serde(default = "default_name_header")]
    pub name_header: String,
    #[serde(default = "default_isbn_header")]
    pub isbn_header: String,
    #[serde(default = "default_rate_limit_delay_ms")]
    pub rate_limit_delay_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Also write a daily-rotated log under the log directory
    #[serde(default)]
    pub file: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    pub name: String,
    pub language_code: String,
    pub start_page: u32,
    pub end_page: u32,
    /// Relative paths resolve against the progress directory
    pub progress_file: PathBuf,
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "https://read.tn.edu.tw/Book/BookListTable".to_string()
}

fn default_book_type() -> u32 {
    6
}

fn default_book_sort() -> u32 {
    1
}

fn default_row_selector() -> String {
    "table tbody tr".to_string()
}

fn default_render_timeout_seconds() -> u64 {
    15
}

fn default_settle_millis() -> u64 {
    2000
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_unit_seconds() -> u64 {
    3
}

fn default_checkpoint_interval() -> u32 {
    3
}

fn default_avg_records_per_page() -> u32 {
    8
}

fn default_completion_threshold() -> f64 {
    0.7
}

fn default_backend() -> StoreBackend {
    StoreBackend::Google
}

fn default_name_header() -> String {
    "書名".to_string()
}

fn default_isbn_header() -> String {
    "ISBN".to_string()
}

fn default_rate_limit_delay_ms() -> u64 {
    1000
}

/// The four partitions of the catalog: three Chinese page ranges and the English list
pub fn default_batches() -> Vec<BatchConfig> {
    vec![
        BatchConfig {
            name: "Chinese books, pages 1-80".to_string(),
            language_code: "1".to_string(),
            start_page: 1,
            end_page: 80,
            progress_file: PathBuf::from("zh_books_1_80.json"),
        },
        BatchConfig {
            name: "Chinese books, pages 81-160".to_string(),
            language_code: "1".to_string(),
            start_page: 81,
            end_page: 160,
            progress_file: PathBuf::from("zh_books_81_160.json"),
        },
        BatchConfig {
            name: "Chinese books, pages 161-242".to_string(),
            language_code: "1".to_string(),
            start_page: 161,
            end_page: 242,
            progress_file: PathBuf::from("zh_books_161_242.json"),
        },
        BatchConfig {
            name: "English books, pages 1-11".to_string(),
            language_code: "2".to_string(),
            start_page: 1,
            end_page: 11,
            progress_file: PathBuf::from("en_books.json"),
        },
    ]
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            book_type: default_book_type(),
            book_sort: default_book_sort(),
            row_selector: default_row_selector(),
            render_timeout_seconds: default_render_timeout_seconds(),
            settle_millis: default_settle_millis(),
            headless: true,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_unit_seconds: default_backoff_unit_seconds(),
            checkpoint_interval: default_checkpoint_interval(),
            avg_records_per_page: default_avg_records_per_page(),
            completion_threshold: default_completion_threshold(),
        }
    }
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: String::new(),
            worksheet: None,
            service_account_key: None,
            credentials_file: None,
            csv_path: None,
            name_header: default_name_header(),
            isbn_header: default_isbn_header(),
            rate_limit_delay_ms: default_rate_limit_delay_ms(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog: CatalogConfig::default(),
            fetch: FetchConfig::default(),
            sheet: SheetConfig::default(),
            logging: LoggingConfig::default(),
            batches: default_batches(),
        }
    }
}

impl Config {
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Missing file means "all defaults"; a present but malformed file is an error
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Batches with progress files resolved against `progress_dir`
    pub fn resolved_batches(&self, progress_dir: &Path) -> Vec<Batch> {
        self.batches
            .iter()
            .map(|b| Batch {
                display_name: b.name.clone(),
                language_code: b.language_code.clone(),
                start_page: b.start_page,
                end_page: b.end_page,
                progress_file: if b.progress_file.is_absolute() {
                    b.progress_file.clone()
                } else {
                    progress_dir.join(&b.progress_file)
                },
            })
            .collect()
    }

    /// Everything that must hold before a run starts scraping
    pub fn validate(&self, paths: &PathManager) -> anyhow::Result<()> {
        if self.batches.is_empty() {
            return Err(anyhow::anyhow!("At least one [[batches]] entry is required"));
        }

        let consolidated = paths.consolidated_file();
        let resolved = self.resolved_batches(&paths.progress_dir());
        let mut seen_files = HashSet::new();
        for (batch, resolved) in self.batches.iter().zip(&resolved) {
            if batch.start_page == 0 {
                return Err(anyhow::anyhow!("Batch '{}': pages are 1-based, start_page must be >= 1", batch.name));
            }
            if batch.end_page < batch.start_page {
                return Err(anyhow::anyhow!(
                    "Batch '{}': end_page {} is before start_page {}",
                    batch.name, batch.end_page, batch.start_page
                ));
            }
            if batch.language_code.trim().is_empty() {
                return Err(anyhow::anyhow!("Batch '{}': language_code is empty", batch.name));
            }
            if resolved.progress_file == consolidated {
                return Err(anyhow::anyhow!(
                    "Batch '{}': progress file {} would overwrite the consolidated result",
                    batch.name,
                    consolidated.display()
                ));
            }
            if !seen_files.insert(resolved.progress_file.clone()) {
                return Err(anyhow::anyhow!(
                    "Batch '{}': progress file {} is shared with another batch",
                    batch.name,
                    batch.progress_file.display()
                ));
            }
        }

        let fetch = &self.fetch;
        if fetch.max_retries == 0 {
            return Err(anyhow::anyhow!("fetch.max_retries must be at least 1"));
        }
        if fetch.checkpoint_interval == 0 {
            return Err(anyhow::anyhow!("fetch.checkpoint_interval must be at least 1"));
        }
        if fetch.avg_records_per_page == 0 {
            return Err(anyhow::anyhow!("fetch.avg_records_per_page must be at least 1"));
        }
        if !(fetch.completion_threshold > 0.0 && fetch.completion_threshold <= 1.0) {
            return Err(anyhow::anyhow!(
                "fetch.completion_threshold must be in (0, 1], got {}",
                fetch.completion_threshold
            ));
        }

        if self.sheet.name_header.trim().is_empty() || self.sheet.isbn_header.trim().is_empty() {
            return Err(anyhow::anyhow!("sheet.name_header and sheet.isbn_header must be set"));
        }

        match self.sheet.backend {
            StoreBackend::Google => {
                if self.sheet.url.trim().is_empty() {
                    return Err(anyhow::anyhow!("sheet.url is required for the google backend"));
                }
                if !self.sheet.url.contains("/spreadsheets/d/") {
                    return Err(anyhow::anyhow!("sheet.url does not look like a spreadsheet URL: {}", self.sheet.url));
                }
            }
            StoreBackend::Csv => {
                let path = self.sheet.csv_path.as_ref()
                    .ok_or_else(|| anyhow::anyhow!("sheet.csv_path is required for the csv backend"))?;
                if !path.exists() {
                    return Err(anyhow::anyhow!("sheet.csv_path {} does not exist", path.display()));
                }
            }
        }

        Ok(())
    }
}
