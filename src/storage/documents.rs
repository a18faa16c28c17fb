use rusqlite::types::ValueRef;
use rusqlite::{OptionalExtension, Row, params};
use tracing::debug;

use super::{Database, StorageError};
use crate::model::decode::names_from_json;
use crate::model::{DocumentRecord, MergedDocuments, Provider};

const DOCUMENT_COLUMNS: &str = "s.paper_id, s.title, s.authors, s.year, s.abstract, s.venue, \
     s.citation_count, s.publication_types, s.journal_name, s.pdf_url, s.source_api";

impl Database {
    /// Insert a document unless its id already exists. Returns true when a row was written.
    pub fn save_document(
        &self,
        doc: &DocumentRecord,
        plan_id: Option<i64>,
    ) -> Result<bool, StorageError> {
        let authors = serde_json::to_string(&doc.authors)?;
        let publication_types = serde_json::to_string(&doc.publication_types)?;
        let conn = self.conn();
        let written = conn.execute(
            "INSERT OR IGNORE INTO sources
                (paper_id, plan_id, title, authors, year, venue, citation_count,
                 abstract, publication_types, journal_name, source_api, pdf_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                doc.id,
                plan_id,
                doc.title,
                authors,
                doc.year,
                doc.venue,
                doc.citation_count,
                doc.abstract_text,
                publication_types,
                doc.journal,
                doc.origin().as_str(),
                doc.pdf_url,
            ],
        )?;
        Ok(written > 0)
    }

    pub fn get_document(&self, id: &str) -> Result<Option<DocumentRecord>, StorageError> {
        let conn = self.conn();
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM sources s WHERE s.paper_id = ?1");
        let doc = conn
            .query_row(&sql, params![id], |row| Ok(document_from_row(row)))
            .optional()?;
        Ok(doc.flatten())
    }

    pub fn document_count(&self) -> Result<usize, StorageError> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM sources", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Run an FTS5 `MATCH` expression, best rank first, then most cited, then newest.
    ///
    /// Rows sharing an id are folded with the completeness rule.
    pub fn search_documents(
        &self,
        match_query: &str,
        limit: usize,
    ) -> Result<Vec<DocumentRecord>, StorageError> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS}
             FROM sources_fts fts
             JOIN sources s ON s.rowid = fts.rowid
             WHERE sources_fts MATCH ?1
             ORDER BY rank, s.citation_count DESC, s.year DESC
             LIMIT ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![match_query, limit], |row| {
            Ok(document_from_row(row))
        })?;

        let mut merged = MergedDocuments::new();
        for row in rows {
            if let Some(doc) = row? {
                merged.insert(doc);
            }
        }
        Ok(merged.into_vec())
    }
}

/// Rebuild a record from a row. Rows without id or title are skipped;
/// malformed nested fields decode to empty lists.
fn document_from_row(row: &Row<'_>) -> Option<DocumentRecord> {
    let id = text_at(row, 0)?;
    let Some(title) = text_at(row, 1) else {
        debug!(paper_id = %id, "skipping stored document without title");
        return None;
    };

    Some(DocumentRecord {
        authors: names_from_json(text_at(row, 2).as_deref(), "authors", &id),
        year: int_at(row, 3).and_then(|y| i32::try_from(y).ok()),
        abstract_text: text_at(row, 4),
        venue: text_at(row, 5),
        citation_count: int_at(row, 6).and_then(|c| u32::try_from(c).ok()),
        publication_types: names_from_json(text_at(row, 7).as_deref(), "publication_types", &id),
        journal: text_at(row, 8),
        pdf_url: text_at(row, 9),
        origin: Some(Provider::from_label(text_at(row, 10).as_deref())),
        title,
        id,
    })
}

fn text_at(row: &Row<'_>, idx: usize) -> Option<String> {
    match row.get_ref(idx).ok()? {
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes).trim().to_string();
            (!text.is_empty()).then_some(text)
        }
        ValueRef::Integer(i) => Some(i.to_string()),
        _ => None,
    }
}

fn int_at(row: &Row<'_>, idx: usize) -> Option<i64> {
    match row.get_ref(idx).ok()? {
        ValueRef::Integer(i) => Some(i),
        ValueRef::Real(f) => Some(f as i64),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes).ok()?.trim().parse().ok(),
        _ => None,
    }
}
