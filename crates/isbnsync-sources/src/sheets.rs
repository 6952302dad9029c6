use crate::error::StoreError;
use crate::table::{find_header, rows_from_table};
use crate::traits::RecordStore;
use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use isbnsync_models::{ColumnId, StoreRow};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use tracing::{debug, info};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";

const SHEETS_SCOPES: &[&str] = &["https://www.googleapis.com/auth/spreadsheets"];

/// Covers the whole grid of the addressed sheet
const FULL_RANGE: &str = "A:ZZZ";

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Source of the bearer token sent with every Sheets request.
pub enum SheetsAuth {
    /// Pre-issued OAuth access token, sent as-is until it expires
    Static(String),
    /// Service account key; tokens are minted on demand and refreshed before expiry
    ServiceAccount(CustomServiceAccount),
}

impl SheetsAuth {
    pub fn service_account(key_file: &Path) -> Result<Self, StoreError> {
        CustomServiceAccount::from_file(key_file)
            .map(Self::ServiceAccount)
            .map_err(|e| StoreError::Auth(format!("service account key {}: {}", key_file.display(), e)))
    }

    fn describe(&self) -> &'static str {
        match self {
            Self::Static(_) => "static access token",
            Self::ServiceAccount(_) => "service account",
        }
    }

    async fn bearer(&self) -> Result<String, StoreError> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::ServiceAccount(account) => {
                let token = account
                    .token(SHEETS_SCOPES)
                    .await
                    .map_err(|e| StoreError::Auth(format!("token request failed: {}", e)))?;
                Ok(token.as_str().to_string())
            }
        }
    }
}

/// A Google Sheets worksheet accessed through the v4 values API.
pub struct SheetsStore {
    client: Client,
    api_base: String,
    spreadsheet_id: String,
    worksheet: Option<String>,
    auth: SheetsAuth,
    name_header: String,
    isbn_header: String,
}

impl SheetsStore {
    pub fn new(
        url: &str,
        worksheet: Option<String>,
        auth: SheetsAuth,
        name_header: String,
        isbn_header: String,
    ) -> Result<Self, StoreError> {
        let spreadsheet_id = parse_spreadsheet_id(url)
            .ok_or_else(|| StoreError::Config(format!("no spreadsheet id in URL {}", url)))?;
        if let SheetsAuth::Static(token) = &auth {
            if token.trim().is_empty() {
                return Err(StoreError::Config("empty Google Sheets access token".to_string()));
            }
        }

        Ok(Self {
            client: Client::new(),
            api_base: SHEETS_API.to_string(),
            spreadsheet_id,
            worksheet,
            auth,
            name_header,
            isbn_header,
        })
    }

    #[cfg(test)]
    fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    /// Prefix an A1 range with the worksheet title when one is configured
    fn range(&self, a1: &str) -> String {
        qualified_range(self.worksheet.as_deref(), a1)
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/{}/values/{}",
            self.api_base,
            self.spreadsheet_id,
            urlencoding::encode(range)
        )
    }

    async fn read_values(&self, a1: &str) -> Result<Vec<Vec<String>>, StoreError> {
        let range = self.range(a1);
        let token = self.auth.bearer().await?;
        let response = self
            .client
            .get(self.values_url(&range))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| StoreError::Read(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Auth(format!("{} - {}", status, body)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Read(format!("GET {}: {} - {}", range, status, body)));
        }

        let value_range: ValueRange = response
            .json()
            .await
            .map_err(|e| StoreError::Read(format!("unexpected response for {}: {}", range, e)))?;
        debug!("Read {} rows from {}", value_range.values.len(), range);
        Ok(value_range.values)
    }
}

#[async_trait]
impl RecordStore for SheetsStore {
    fn store_name(&self) -> &str {
        "google-sheets"
    }

    async fn verify(&self) -> Result<(), StoreError> {
        let header = self.read_values("1:1").await?;
        find_header(&header, &self.name_header)?;
        find_header(&header, &self.isbn_header)?;
        info!("Connected to spreadsheet {} ({})", self.spreadsheet_id, self.auth.describe());
        Ok(())
    }

    async fn list_rows(&self) -> Result<Vec<StoreRow>, StoreError> {
        let table = self.read_values(FULL_RANGE).await?;
        rows_from_table(&table, &self.name_header, &self.isbn_header)
    }

    async fn find_column(&self, header: &str) -> Result<ColumnId, StoreError> {
        let table = self.read_values("1:1").await?;
        find_header(&table, header)
    }

    async fn update_cell(&self, row_index: usize, column: ColumnId, value: &str) -> Result<(), StoreError> {
        let range = self.range(&format!("{}{}", column.letters(), row_index));
        let token = self.auth.bearer().await?;
        let response = self
            .client
            .put(self.values_url(&range))
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(token)
            .json(&json!({ "values": [[value]] }))
            .send()
            .await
            .map_err(|e| StoreError::Write {
                row: row_index,
                message: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Auth(format!("{} - {}", status, body)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Write {
                row: row_index,
                message: format!("{} - {}", status, body),
            });
        }
        Ok(())
    }
}

/// Extract `<id>` from `https://docs.google.com/spreadsheets/d/<id>/edit...`
pub fn parse_spreadsheet_id(url: &str) -> Option<String> {
    let rest = url.split("/spreadsheets/d/").nth(1)?;
    let id: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

fn qualified_range(worksheet: Option<&str>, a1: &str) -> String {
    match worksheet {
        Some(title) => format!("'{}'!{}", title.replace('\'', "''"), a1),
        None => a1.to_string(),
    }
}
