//! In-memory fetchers and stores for unit tests.

use async_trait::async_trait;
use isbnsync_models::{ColumnId, StoreRow};
use isbnsync_sources::{FetchError, FetcherInitError, FetcherProvider, PageFetcher, RecordStore, Row, StoreError};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A catalog row carrying `name` and `isbn` in the cells the extractor reads
pub fn book_row(name: &str, isbn: &str) -> Row {
    Row::new([name, "author", "publisher", isbn])
}

/// What the fake catalog does when a page is requested
#[derive(Clone)]
pub enum PageScript {
    Rows(Vec<Row>),
    /// Fail this many attempts, then return the rows
    FlakyThen(usize, Vec<Row>),
    AlwaysFail,
    /// Never resolve
    Hang,
}

#[derive(Default)]
pub struct FetchLog {
    pub acquisitions: usize,
    pub releases: usize,
    /// Page number of every fetch attempt, in order
    pub attempts: Vec<u32>,
    /// Records in the watched progress file at each attempt
    pub snapshots: Vec<(u32, usize)>,
}

impl FetchLog {
    pub fn attempts_for(&self, page: u32) -> usize {
        self.attempts.iter().filter(|p| **p == page).count()
    }
}

#[derive(Clone, Default)]
pub struct FakeCatalog {
    pages: HashMap<(String, u32), PageScript>,
    fail_acquire: bool,
    watch_file: Option<PathBuf>,
    log: Arc<Mutex<FetchLog>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, language: &str, page: u32, script: PageScript) -> Self {
        self.pages.insert((language.to_string(), page), script);
        self
    }

    pub fn failing_to_start(mut self) -> Self {
        self.fail_acquire = true;
        self
    }

    /// Snapshot the record count of `path` before every fetch attempt
    pub fn watching(mut self, path: PathBuf) -> Self {
        self.watch_file = Some(path);
        self
    }

    pub fn log(&self) -> std::sync::MutexGuard<'_, FetchLog> {
        self.log.lock().unwrap()
    }
}

#[async_trait]
impl FetcherProvider for FakeCatalog {
    async fn acquire(&self) -> Result<Box<dyn PageFetcher>, FetcherInitError> {
        self.log().acquisitions += 1;
        if self.fail_acquire {
            return Err(FetcherInitError("no browser in test".to_string()));
        }
        Ok(Box::new(FakeFetcher {
            catalog: self.clone(),
            failures: HashMap::new(),
        }))
    }
}

struct FakeFetcher {
    catalog: FakeCatalog,
    failures: HashMap<(String, u32), usize>,
}

fn parse_query(url: &str) -> (String, u32) {
    let param = |key: &str| {
        url.split(['?', '&'])
            .find_map(|pair| pair.strip_prefix(key))
            .unwrap_or_default()
            .to_string()
    };
    (param("PlanetLanguage="), param("page=").parse().unwrap())
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    fn fetcher_name(&self) -> &str {
        "fake"
    }

    async fn fetch_rows(&mut self, url: &str, _selector: &str, _timeout: Duration) -> Result<Vec<Row>, FetchError> {
        let key = parse_query(url);
        {
            let mut log = self.catalog.log();
            log.attempts.push(key.1);
            if let Some(path) = &self.catalog.watch_file {
                let saved = std::fs::read_to_string(path)
                    .ok()
                    .and_then(|s| serde_json::from_str::<Vec<serde_json::Value>>(&s).ok())
                    .map(|v| v.len())
                    .unwrap_or(0);
                log.snapshots.push((key.1, saved));
            }
        }

        let failure = FetchError::Navigation {
            url: url.to_string(),
            message: "scripted failure".to_string(),
        };
        match self.catalog.pages.get(&key).cloned() {
            None => Ok(Vec::new()),
            Some(PageScript::Rows(rows)) => Ok(rows),
            Some(PageScript::AlwaysFail) => Err(failure),
            Some(PageScript::FlakyThen(times, rows)) => {
                let failed = self.failures.entry(key).or_insert(0);
                if *failed < times {
                    *failed += 1;
                    Err(failure)
                } else {
                    Ok(rows)
                }
            }
            Some(PageScript::Hang) => {
                std::future::pending::<()>().await;
                Ok(Vec::new())
            }
        }
    }

    async fn release(&mut self) {
        self.catalog.log().releases += 1;
    }
}

/// A sheet held in memory: header row plus data rows.
pub struct FakeSheet {
    pub table: Mutex<Vec<Vec<String>>>,
    /// Sheet rows whose updates fail
    pub failing_rows: HashSet<usize>,
    pub writes: Mutex<Vec<(usize, ColumnId, String)>>,
}

impl FakeSheet {
    pub fn new(rows: &[(&str, &str)]) -> Self {
        let mut table = vec![vec!["書名".to_string(), "作者".to_string(), "ISBN".to_string()]];
        for (name, isbn) in rows {
            table.push(vec![name.to_string(), "someone".to_string(), isbn.to_string()]);
        }
        Self {
            table: Mutex::new(table),
            failing_rows: HashSet::new(),
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn without_isbn_column(rows: &[&str]) -> Self {
        let mut table = vec![vec!["書名".to_string()]];
        table.extend(rows.iter().map(|name| vec![name.to_string()]));
        Self {
            table: Mutex::new(table),
            failing_rows: HashSet::new(),
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, row_index: usize) -> Self {
        self.failing_rows.insert(row_index);
        self
    }

    pub fn isbn_at(&self, row_index: usize) -> String {
        self.table.lock().unwrap()[row_index - 1][2].clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }
}

#[async_trait]
impl RecordStore for FakeSheet {
    fn store_name(&self) -> &str {
        "fake-sheet"
    }

    async fn list_rows(&self) -> Result<Vec<StoreRow>, StoreError> {
        let table = self.table.lock().unwrap();
        Ok(table
            .iter()
            .enumerate()
            .skip(1)
            .map(|(idx, row)| StoreRow {
                row_index: idx + 1,
                display_name: row[0].clone(),
                stored_isbn: row.get(2).cloned().unwrap_or_default(),
            })
            .collect())
    }

    async fn find_column(&self, header: &str) -> Result<ColumnId, StoreError> {
        let table = self.table.lock().unwrap();
        table[0]
            .iter()
            .position(|h| h == header)
            .map(|idx| ColumnId(idx + 1))
            .ok_or_else(|| StoreError::ColumnNotFound(header.to_string()))
    }

    async fn update_cell(&self, row_index: usize, column: ColumnId, value: &str) -> Result<(), StoreError> {
        if self.failing_rows.contains(&row_index) {
            return Err(StoreError::Write {
                row: row_index,
                message: "scripted failure".to_string(),
            });
        }
        self.table.lock().unwrap()[row_index - 1][column.offset()] = value.to_string();
        self.writes
            .lock()
            .unwrap()
            .push((row_index, column, value.to_string()));
        Ok(())
    }
}
