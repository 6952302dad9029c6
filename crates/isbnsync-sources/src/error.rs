use thiserror::Error;

/// One failed attempt at loading a catalog page. Retried by the batch runner.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to load {url}: {message}")]
    Navigation { url: String, message: String },

    #[error("no element matching '{selector}' within {seconds}s")]
    RenderTimeout { selector: String, seconds: u64 },

    #[error("failed to read table cells: {0}")]
    Script(String),
}

/// The browser could not be started; fatal to the batch that asked for it.
#[derive(Debug, Error)]
#[error("page fetcher unavailable: {0}")]
pub struct FetcherInitError(pub String);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("column '{0}' not found in header row")]
    ColumnNotFound(String),

    #[error("failed to write row {row}: {message}")]
    Write { row: usize, message: String },

    #[error("failed to read store: {0}")]
    Read(String),

    #[error("store rejected credentials: {0}")]
    Auth(String),

    #[error("invalid store configuration: {0}")]
    Config(String),
}
