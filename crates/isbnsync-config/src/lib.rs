pub mod config;
pub mod credentials;
pub mod paths;

pub use config::{BatchConfig, CatalogConfig, Config, FetchConfig, LoggingConfig, SheetConfig, StoreBackend, default_batches};
pub use credentials::CredentialStore;
pub use paths::{PathManager, container_base_path};
