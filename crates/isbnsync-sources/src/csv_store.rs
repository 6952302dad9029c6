use crate::error::StoreError;
use crate::table::{find_header, rows_from_table};
use crate::traits::RecordStore;
use async_trait::async_trait;
use isbnsync_models::{ColumnId, StoreRow};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::debug;

/// A sheet exported to CSV (header in the first line), edited in place.
pub struct CsvStore {
    path: PathBuf,
    name_header: String,
    isbn_header: String,
    // Serializes read-modify-write cycles on the file
    write_lock: Mutex<()>,
}

impl CsvStore {
    pub fn new(path: PathBuf, name_header: String, isbn_header: String) -> Self {
        Self {
            path,
            name_header,
            isbn_header,
            write_lock: Mutex::new(()),
        }
    }

    fn read_table(&self) -> Result<Vec<Vec<String>>, StoreError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| StoreError::Read(format!("{}: {}", self.path.display(), e)))?;

        let mut table = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| StoreError::Read(format!("{}: {}", self.path.display(), e)))?;
            table.push(record.iter().map(|s| s.to_string()).collect());
        }
        Ok(table)
    }

    fn write_table(&self, table: &[Vec<String>]) -> std::io::Result<()> {
        let temp_path = self.path.with_extension("csv.tmp");
        {
            let mut writer = csv::WriterBuilder::new()
                .flexible(true)
                .from_path(&temp_path)?;
            for row in table {
                writer.write_record(row)?;
            }
            writer.flush()?;
        }
        std::fs::rename(&temp_path, &self.path)
    }
}

#[async_trait]
impl RecordStore for CsvStore {
    fn store_name(&self) -> &str {
        "csv"
    }

    async fn verify(&self) -> Result<(), StoreError> {
        let table = self.read_table()?;
        find_header(&table, &self.name_header)?;
        find_header(&table, &self.isbn_header)?;
        Ok(())
    }

    async fn list_rows(&self) -> Result<Vec<StoreRow>, StoreError> {
        let table = self.read_table()?;
        rows_from_table(&table, &self.name_header, &self.isbn_header)
    }

    async fn find_column(&self, header: &str) -> Result<ColumnId, StoreError> {
        let table = self.read_table()?;
        find_header(&table, header)
    }

    async fn update_cell(&self, row_index: usize, column: ColumnId, value: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut table = self.read_table()?;

        let row = row_index
            .checked_sub(1)
            .and_then(|idx| table.get_mut(idx))
            .ok_or_else(|| StoreError::Write {
                row: row_index,
                message: "row does not exist".to_string(),
            })?;
        if row.len() <= column.offset() {
            row.resize(column.offset() + 1, String::new());
        }
        row[column.offset()] = value.to_string();

        self.write_table(&table).map_err(|e| StoreError::Write {
            row: row_index,
            message: e.to_string(),
        })?;
        debug!("Updated {}{} in {}", column.letters(), row_index, self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet_file(content: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sheet.csv"), content).unwrap();
        dir
    }

    fn store(dir: &tempfile::TempDir) -> CsvStore {
        CsvStore::new(dir.path().join("sheet.csv"), "書名".to_string(), "ISBN".to_string())
    }

    #[tokio::test]
    async fn test_list_rows() {
        let dir = sheet_file("書名,作者,ISBN\nA,x,111\nB,y,222\n");
        let rows = store(&dir).list_rows().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].row_index, 3);
        assert_eq!(rows[1].display_name, "B");
        assert_eq!(rows[1].stored_isbn, "222");
    }

    #[tokio::test]
    async fn test_update_cell_persists() {
        let dir = sheet_file("書名,作者,ISBN\nA,x,111\nB,y,222\n");
        let store = store(&dir);
        let col = store.find_column("ISBN").await.unwrap();
        assert_eq!(col, ColumnId(3));

        store.update_cell(2, col, "999").await.unwrap();

        let rows = store.list_rows().await.unwrap();
        assert_eq!(rows[0].stored_isbn, "999");
        assert_eq!(rows[1].stored_isbn, "222");
        assert!(!dir.path().join("sheet.csv.tmp").exists());
    }

    #[tokio::test]
    async fn test_update_cell_pads_short_rows() {
        let dir = sheet_file("書名,作者,ISBN\nA\n");
        let store = store(&dir);
        store.update_cell(2, ColumnId(3), "123").await.unwrap();
        let rows = store.list_rows().await.unwrap();
        assert_eq!(rows[0].stored_isbn, "123");
    }

    #[tokio::test]
    async fn test_update_missing_row_is_write_error() {
        let dir = sheet_file("書名,ISBN\nA,1\n");
        let err = store(&dir).update_cell(9, ColumnId(2), "x").await.unwrap_err();
        assert!(matches!(err, StoreError::Write { row: 9, .. }));
    }

    #[tokio::test]
    async fn test_verify_requires_name_header() {
        let dir = sheet_file("Title,ISBN\nA,1\n");
        assert!(matches!(store(&dir).verify().await, Err(StoreError::ColumnNotFound(_))));
    }

    #[tokio::test]
    async fn test_verify_requires_isbn_header() {
        let dir = sheet_file("書名,作者
A,x
");
        match store(&dir).verify().await {
            Err(StoreError::ColumnNotFound(header)) => assert_eq!(header, "ISBN"),
            other => panic!("expected missing ISBN column, got {:?}", other),
        }

        let dir = sheet_file("書名,作者,ISBN
A,x,1
");
        assert!(store(&dir).verify().await.is_ok());
    }
}
