//! SQLite persistence: documents, findings, plans and the FTS5 corpus index.

mod documents;
mod findings;
mod schema;

pub use findings::StoredFinding;

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("could not encode field: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A single SQLite connection shared behind a mutex.
///
/// Calls are short and synchronous; the lock is never held across an await.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "database opened");
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        schema::apply_pragmas(&conn)?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<(), StorageError> {
        Ok(self.conn().execute_batch(sql)?)
    }

    /// Record a research plan and return its id.
    pub fn save_plan(&self, user_query: &str, title: Option<&str>) -> Result<i64, StorageError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO research_plans (user_query, title) VALUES (?1, ?2)",
            rusqlite::params![user_query, title],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Distinct plan queries, most recently planned first.
    pub fn recent_queries(&self, limit: usize) -> Result<Vec<String>, StorageError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT user_query FROM research_plans
             GROUP BY user_query
             ORDER BY MAX(plan_id) DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit as i64], |row| row.get(0))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }
}
