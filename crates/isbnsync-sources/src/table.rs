// Shared header/row handling for stores that expose the sheet as a grid of strings.

use crate::error::StoreError;
use isbnsync_models::{ColumnId, StoreRow};

/// Locate `header` in the first row (exact match after trimming)
pub fn find_header(table: &[Vec<String>], header: &str) -> Result<ColumnId, StoreError> {
    table
        .first()
        .and_then(|head| head.iter().position(|cell| cell.trim() == header))
        .map(|idx| ColumnId(idx + 1))
        .ok_or_else(|| StoreError::ColumnNotFound(header.to_string()))
}

/// Turn a header + data grid into store rows. Short rows read as empty cells.
pub fn rows_from_table(
    table: &[Vec<String>],
    name_header: &str,
    isbn_header: &str,
) -> Result<Vec<StoreRow>, StoreError> {
    let name_col = find_header(table, name_header)?;
    let isbn_col = find_header(table, isbn_header)?;

    let cell = |row: &Vec<String>, col: ColumnId| -> String {
        row.get(col.offset()).cloned().unwrap_or_default()
    };

    Ok(table
        .iter()
        .enumerate()
        .skip(1)
        .map(|(idx, row)| StoreRow {
            row_index: idx + 1,
            display_name: cell(row, name_col),
            stored_isbn: cell(row, isbn_col),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_rows_from_table() {
        let table = grid(&[
            &["書名", "作者", "ISBN"],
            &["A", "x", "111"],
            &["B", "y"],
        ]);
        let rows = rows_from_table(&table, "書名", "ISBN").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row_index, 2);
        assert_eq!(rows[0].display_name, "A");
        assert_eq!(rows[0].stored_isbn, "111");
        assert_eq!(rows[1].row_index, 3);
        assert_eq!(rows[1].stored_isbn, "");
    }

    #[test]
    fn test_missing_header_is_column_not_found() {
        let table = grid(&[&["書名", "作者"], &["A", "x"]]);
        match rows_from_table(&table, "書名", "ISBN") {
            Err(StoreError::ColumnNotFound(h)) => assert_eq!(h, "ISBN"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_find_header_trims_and_is_one_based() {
        let table = grid(&[&["書名", " ISBN "]]);
        assert_eq!(find_header(&table, "ISBN").unwrap(), ColumnId(2));
    }

    #[test]
    fn test_empty_table_has_no_headers() {
        assert!(find_header(&[], "ISBN").is_err());
    }
}
