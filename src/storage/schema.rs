use rusqlite::Connection;

use super::StorageError;

/// Applied to every connection.
const PRAGMAS: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;
    PRAGMA busy_timeout = 30000;
    PRAGMA foreign_keys = ON;
";

const TABLES: &str = "
    CREATE TABLE IF NOT EXISTS research_plans (
        plan_id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_query TEXT NOT NULL,
        title TEXT,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    );
    CREATE INDEX IF NOT EXISTS idx_plans_created_at ON research_plans(created_at);

    CREATE TABLE IF NOT EXISTS sources (
        paper_id TEXT PRIMARY KEY,
        plan_id INTEGER NULL REFERENCES research_plans(plan_id),
        title TEXT,
        authors TEXT,
        year INTEGER,
        venue TEXT,
        citation_count INTEGER,
        abstract TEXT,
        publication_types TEXT,
        journal_name TEXT,
        source_api TEXT,
        pdf_url TEXT,
        retrieved_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    );
    CREATE INDEX IF NOT EXISTS idx_sources_plan_id ON sources(plan_id);
    CREATE INDEX IF NOT EXISTS idx_sources_year ON sources(year);
    CREATE INDEX IF NOT EXISTS idx_sources_citation_count ON sources(citation_count);

    CREATE TABLE IF NOT EXISTS findings (
        finding_id INTEGER PRIMARY KEY AUTOINCREMENT,
        plan_id INTEGER NULL REFERENCES research_plans(plan_id),
        subtopic TEXT NOT NULL,
        paper_id TEXT NOT NULL REFERENCES sources(paper_id),
        finding_text TEXT,
        source_type TEXT,
        relevance_score INTEGER,
        relevance_justification TEXT,
        context_snippet TEXT,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    );
    CREATE INDEX IF NOT EXISTS idx_findings_plan_id ON findings(plan_id);
    CREATE INDEX IF NOT EXISTS idx_findings_paper_id ON findings(paper_id);
    CREATE INDEX IF NOT EXISTS idx_findings_subtopic ON findings(subtopic);
";

/// External-content FTS5 index over title and abstract, kept in sync by triggers.
const FULL_TEXT: &str = "
    CREATE VIRTUAL TABLE IF NOT EXISTS sources_fts USING fts5(
        title,
        abstract,
        content='sources',
        content_rowid='rowid',
        tokenize='porter unicode61 remove_diacritics 2'
    );

    CREATE TRIGGER IF NOT EXISTS sources_ai AFTER INSERT ON sources BEGIN
        INSERT INTO sources_fts (rowid, title, abstract)
        VALUES (new.rowid, new.title, new.abstract);
    END;

    CREATE TRIGGER IF NOT EXISTS sources_bd BEFORE DELETE ON sources BEGIN
        INSERT INTO sources_fts (sources_fts, rowid, title, abstract)
        VALUES ('delete', old.rowid, old.title, old.abstract);
    END;

    CREATE TRIGGER IF NOT EXISTS sources_bu BEFORE UPDATE ON sources BEGIN
        INSERT INTO sources_fts (sources_fts, rowid, title, abstract)
        VALUES ('delete', old.rowid, old.title, old.abstract);
    END;

    CREATE TRIGGER IF NOT EXISTS sources_au AFTER UPDATE ON sources BEGIN
        INSERT INTO sources_fts (rowid, title, abstract)
        VALUES (new.rowid, new.title, new.abstract);
    END;
";

pub(super) fn apply_pragmas(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(PRAGMAS)?;
    Ok(())
}

pub(super) fn initialize(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(TABLES)?;
    conn.execute_batch(FULL_TEXT)?;
    Ok(())
}
