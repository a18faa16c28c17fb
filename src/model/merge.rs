use std::collections::HashMap;

use super::DocumentRecord;

/// Whether `incoming` should replace `existing`.
///
/// Any single gain wins, even when the incoming record lacks something the stored one
/// has; when neither side gains, the earlier record is kept.
pub fn is_more_complete(incoming: &DocumentRecord, existing: &DocumentRecord) -> bool {
    (existing.abstract_text().is_none() && incoming.abstract_text().is_some())
        || incoming.authors.len() > existing.authors.len()
        || (existing.citation_count.is_none() && incoming.citation_count.is_some())
        || (existing.pdf_url().is_none() && incoming.pdf_url().is_some())
}

/// Records unified by id, in first-sighting order.
#[derive(Debug, Default)]
pub struct MergedDocuments {
    records: Vec<DocumentRecord>,
    positions: HashMap<String, usize>,
}

impl MergedDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = DocumentRecord>) -> Self {
        let mut merged = Self::new();
        merged.extend(records);
        merged
    }

    /// Add a record, replacing a stored one only under the completeness rule.
    /// Returns true if the record was new or replaced the stored one.
    pub fn insert(&mut self, record: DocumentRecord) -> bool {
        if record.id.is_empty() {
            return false;
        }
        match self.positions.get(&record.id) {
            Some(&idx) => {
                if is_more_complete(&record, &self.records[idx]) {
                    self.records[idx] = record;
                    true
                } else {
                    false
                }
            }
            None => {
                self.positions.insert(record.id.clone(), self.records.len());
                self.records.push(record);
                true
            }
        }
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = DocumentRecord>) {
        for record in records {
            self.insert(record);
        }
    }

    pub fn get(&self, id: &str) -> Option<&DocumentRecord> {
        self.positions.get(id).map(|&idx| &self.records[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DocumentRecord> {
        self.records.iter()
    }

    pub fn into_vec(self) -> Vec<DocumentRecord> {
        self.records
    }
}
