// Builds the configured record store. The CLI owns the result and passes it down
// by reference; nothing here keeps a global client.

use crate::csv_store::CsvStore;
use crate::sheets::{SheetsAuth, SheetsStore};
use crate::traits::RecordStore;
use anyhow::{anyhow, Result};
use isbnsync_config::{CredentialStore, PathManager, SheetConfig, StoreBackend};
use tracing::info;

/// Create the store for `sheet`. Secrets default to files under the config
/// directory of `paths` unless the sheet config names its own.
pub fn create_store(sheet: &SheetConfig, paths: &PathManager) -> Result<Box<dyn RecordStore>> {
    match sheet.backend {
        StoreBackend::Google => {
            let store = SheetsStore::new(
                &sheet.url,
                sheet.worksheet.clone(),
                sheets_auth(sheet, paths)?,
                sheet.name_header.clone(),
                sheet.isbn_header.clone(),
            )?;
            info!("Using Google Sheets store (spreadsheet {})", store.spreadsheet_id());
            Ok(Box::new(store))
        }
        StoreBackend::Csv => {
            let path = sheet
                .csv_path
                .clone()
                .ok_or_else(|| anyhow!("sheet.csv_path is required for the csv backend"))?;
            info!("Using CSV store at {}", path.display());
            Ok(Box::new(CsvStore::new(path, sheet.name_header.clone(), sheet.isbn_header.clone())))
        }
    }
}

/// A static token in the credentials file wins; otherwise the service account key is used.
fn sheets_auth(sheet: &SheetConfig, paths: &PathManager) -> Result<SheetsAuth> {
    let credentials_file = match &sheet.credentials_file {
        Some(path) if !path.exists() => {
            return Err(anyhow!("Credentials file {} does not exist", path.display()));
        }
        Some(path) => path.clone(),
        None => paths.credentials_file(),
    };

    let mut cred_store = CredentialStore::new(credentials_file.clone());
    cred_store
        .load()
        .map_err(|e| anyhow!("Failed to load credentials from {}: {}", credentials_file.display(), e))?;
    if let Some(token) = cred_store.get_sheets_access_token() {
        info!("Using static Google Sheets access token from {}", credentials_file.display());
        return Ok(SheetsAuth::Static(token.clone()));
    }

    let key_file = sheet
        .service_account_key
        .clone()
        .unwrap_or_else(|| paths.service_account_key_file());
    if !key_file.exists() {
        return Err(anyhow!(
            "No Google credentials: service account key {} does not exist and {} has no google_sheets_access_token",
            key_file.display(),
            credentials_file.display()
        ));
    }
    info!("Using service account key {}", key_file.display());
    Ok(SheetsAuth::service_account(&key_file)?)
}
