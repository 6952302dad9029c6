use serde::{Deserialize, Serialize};

/// One book scraped from the catalog table.
///
/// Two records are the same book iff both fields match exactly; no case folding
/// or whitespace normalization is applied beyond the trim done at extraction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Record {
    pub name: String,
    pub isbn: String,
}

impl Record {
    pub fn new(name: impl Into<String>, isbn: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            isbn: isbn.into(),
        }
    }
}
