use rusqlite::params;

use super::{Database, StorageError};
use crate::model::FindingRecord;

/// A finding as read back from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFinding {
    pub finding_id: i64,
    pub plan_id: Option<i64>,
    pub subtopic: String,
    pub document_id: String,
    pub finding: String,
    pub source_type: String,
    pub relevance_score: Option<i64>,
    pub justification: Option<String>,
    pub context_snippet: Option<String>,
}

impl Database {
    /// Persist a finding. The referenced document must already be stored.
    pub fn save_finding(&self, finding: &FindingRecord) -> Result<i64, StorageError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO findings
                (plan_id, subtopic, paper_id, finding_text, source_type,
                 relevance_score, relevance_justification, context_snippet)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                finding.plan_id,
                finding.subtopic,
                finding.document_id,
                finding.finding,
                finding.source.as_str(),
                finding.relevance_score,
                finding.justification,
                finding.context_snippet,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Findings recorded for a subtopic, oldest first.
    pub fn findings_for_subtopic(&self, subtopic: &str) -> Result<Vec<StoredFinding>, StorageError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT finding_id, plan_id, subtopic, paper_id, finding_text, source_type,
                    relevance_score, relevance_justification, context_snippet
             FROM findings
             WHERE subtopic = ?1
             ORDER BY finding_id",
        )?;
        let rows = stmt.query_map(params![subtopic], |row| {
            Ok(StoredFinding {
                finding_id: row.get(0)?,
                plan_id: row.get(1)?,
                subtopic: row.get(2)?,
                document_id: row.get(3)?,
                finding: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                source_type: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                relevance_score: row.get(6)?,
                justification: row.get(7)?,
                context_snippet: row.get(8)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
