use isbnsync_models::Record;
use std::collections::HashSet;

/// Insertion-ordered set of records keyed on the exact (name, isbn) pair.
#[derive(Debug, Default, Clone)]
pub struct RecordSet {
    seen: HashSet<Record>,
    records: Vec<Record>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from `records`, dropping later repeats of a pair
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut set = Self::new();
        for record in records {
            set.insert(record);
        }
        set
    }

    /// Returns false (and drops `record`) when the pair is already present
    pub fn insert(&mut self, record: Record) -> bool {
        if self.seen.contains(&record) {
            return false;
        }
        self.seen.insert(record.clone());
        self.records.push(record);
        true
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn as_slice(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

/// Remove repeated pairs keeping first-seen order; returns the survivors and the removed count
pub fn dedup_records(records: Vec<Record>) -> (Vec<Record>, usize) {
    let before = records.len();
    let unique = RecordSet::from_records(records).into_records();
    let removed = before - unique.len();
    (unique, removed)
}
