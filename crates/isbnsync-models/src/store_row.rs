use serde::{Deserialize, Serialize};
use std::fmt;

/// A row of the record store as seen by the reconciler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreRow {
    /// 1-based sheet row; the header occupies row 1
    pub row_index: usize,
    pub display_name: String,
    pub stored_isbn: String,
}

/// 1-based column position within the store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ColumnId(pub usize);

impl ColumnId {
    /// A1-notation letters: 1 -> A, 26 -> Z, 27 -> AA
    pub fn letters(&self) -> String {
        let mut n = self.0;
        let mut out = Vec::new();
        while n > 0 {
            let rem = (n - 1) % 26;
            out.push(b'A' + rem as u8);
            n = (n - 1) / 26;
        }
        out.reverse();
        String::from_utf8(out).unwrap_or_default()
    }

    /// Zero-based offset into a row's cells
    pub fn offset(&self) -> usize {
        self.0.saturating_sub(1)
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letters())
    }
}
