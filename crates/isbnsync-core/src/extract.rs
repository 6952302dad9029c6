use isbnsync_models::Record;
use isbnsync_sources::Row;

/// Rows with fewer cells are layout rows, not books
const MIN_CELLS: usize = 4;
const NAME_CELL: usize = 0;
const ISBN_CELL: usize = 3;

/// Unrendered client-side template placeholder
const TEMPLATE_MARKER: &str = "{{";

/// Turn a rendered table row into a record, if it holds a real book
pub fn extract_record(row: &Row) -> Option<Record> {
    if row.cells.len() < MIN_CELLS {
        return None;
    }

    let name = row.cells[NAME_CELL].trim();
    let isbn = row.cells[ISBN_CELL].trim();
    if !is_usable(name) || !is_usable(isbn) {
        return None;
    }

    Some(Record::new(name, isbn))
}

fn is_usable(value: &str) -> bool {
    !value.is_empty() && !value.contains(TEMPLATE_MARKER)
}
