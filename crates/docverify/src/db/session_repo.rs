//! Session repository: operations on the `sessions` table.
//!
//! Session rows are always read together with their per-status document
//! counts so callers never have to issue a second query for progress.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::document_repo::{self, DocumentRow};
use super::{now_timestamp, Database, DatabaseError};
use crate::models::{DocumentStatus, SessionStatus};

const SELECT_SESSION: &str = "SELECT s.id, s.documents_count, s.status, s.created_at, s.updated_at,
    (SELECT COUNT(*) FROM session_documents d WHERE d.session_id = s.id AND d.status = 'SUCCESSFUL') AS successful_count,
    (SELECT COUNT(*) FROM session_documents d WHERE d.session_id = s.id AND d.status = 'FAILED') AS failed_count
    FROM sessions s";

/// A session row with its document counters.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRow {
    pub id: i64,
    pub documents_count: u32,
    pub status: SessionStatus,
    pub successful_count: u32,
    pub failed_count: u32,
    pub created_at: String,
    pub updated_at: String,
}

impl SessionRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            documents_count: row.get("documents_count")?,
            status: row.get("status")?,
            successful_count: row.get("successful_count")?,
            failed_count: row.get("failed_count")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Documents that reached a terminal state.
    pub fn finished_count(&self) -> u32 {
        self.successful_count + self.failed_count
    }

    pub fn is_complete(&self) -> bool {
        self.status != SessionStatus::Processing
    }
}

/// Inserts an empty session expecting `documents_count` documents.
pub fn insert(db: &Database, documents_count: u32) -> Result<SessionRow, DatabaseError> {
    db.with_conn(|conn| {
        let id = insert_session(conn, documents_count, &now_timestamp())?;
        load(conn, id)?.ok_or(DatabaseError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    })
}

/// Creates a session and one PENDING document per name in a single
/// transaction. Documents are returned in the order of `names`.
pub fn create_with_documents(
    db: &Database,
    names: &[String],
) -> Result<(SessionRow, Vec<DocumentRow>), DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        let now = now_timestamp();
        let session_id = insert_session(&tx, names.len() as u32, &now)?;

        let mut document_ids = Vec::with_capacity(names.len());
        for name in names {
            document_ids.push(document_repo::insert_in(&tx, session_id, name, &now)?);
        }
        tx.commit()?;

        let session =
            load(conn, session_id)?.ok_or(DatabaseError::Sqlite(rusqlite::Error::QueryReturnedNoRows))?;
        let mut documents = Vec::with_capacity(document_ids.len());
        for id in document_ids {
            if let Some(doc) = document_repo::load(conn, id)? {
                documents.push(doc);
            }
        }
        Ok((session, documents))
    })
}

/// Finds a session by its ID.
pub fn find_by_id(db: &Database, id: i64) -> Result<Option<SessionRow>, DatabaseError> {
    db.with_conn(|conn| load(conn, id))
}

/// Lists sessions newest first, optionally restricted to one status.
pub fn list(db: &Database, status: Option<SessionStatus>) -> Result<Vec<SessionRow>, DatabaseError> {
    db.with_conn(|conn| {
        let rows = match status {
            Some(status) => {
                let mut stmt = conn.prepare(&format!(
                    "{SELECT_SESSION} WHERE s.status = ?1 ORDER BY s.created_at DESC, s.id DESC"
                ))?;
                let rows = stmt
                    .query_map(params![status], SessionRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "{SELECT_SESSION} ORDER BY s.created_at DESC, s.id DESC"
                ))?;
                let rows = stmt
                    .query_map([], SessionRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(rows)
    })
}

/// Overwrites the session status.
pub fn update_status(db: &Database, id: i64, status: SessionStatus) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE sessions SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, status, now_timestamp()],
        )?;
        Ok(changed > 0)
    })
}

/// Re-derives the session status from its documents.
///
/// Once every expected document is terminal the session moves from
/// PROCESSING to SUCCESS (all successful) or FAILED (at least one failed).
/// A session that already left PROCESSING is not touched. Returns the
/// resulting row, or `None` when the session no longer exists.
pub fn refresh_status(db: &Database, id: i64) -> Result<Option<SessionRow>, DatabaseError> {
    db.with_conn(|conn| {
        let Some(session) = load(conn, id)? else {
            return Ok(None);
        };
        if session.status != SessionStatus::Processing {
            return Ok(Some(session));
        }

        let pending: u32 = conn.query_row(
            "SELECT COUNT(*) FROM session_documents WHERE session_id = ?1 AND status = ?2",
            params![id, DocumentStatus::Pending],
            |r| r.get(0),
        )?;
        if pending > 0 || session.finished_count() < session.documents_count {
            return Ok(Some(session));
        }

        let next = if session.failed_count == 0 {
            SessionStatus::Success
        } else {
            SessionStatus::Failed
        };
        conn.execute(
            "UPDATE sessions SET status = ?2, updated_at = ?3 WHERE id = ?1 AND status = 'PROCESSING'",
            params![id, next, now_timestamp()],
        )?;
        load(conn, id)
    })
}

/// Deletes a session; documents and analyses go with it.
pub fn delete(db: &Database, id: i64) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    })
}

fn insert_session(conn: &Connection, documents_count: u32, now: &str) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO sessions (documents_count, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?3)",
        params![documents_count, SessionStatus::Processing, now],
    )?;
    Ok(conn.last_insert_rowid())
}

fn load(conn: &Connection, id: i64) -> Result<Option<SessionRow>, DatabaseError> {
    Ok(conn
        .query_row(
            &format!("{SELECT_SESSION} WHERE s.id = ?1"),
            params![id],
            SessionRow::from_row,
        )
        .optional()?)
}
