//! Document repository: operations on the `session_documents` table.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{now_timestamp, Database, DatabaseError};
use crate::models::{DocumentStatus, Verification};

/// A raw document row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRow {
    pub id: i64,
    pub session_id: i64,
    pub original_name: String,
    pub status: DocumentStatus,
    pub verification: Verification,
    /// Serialized labels payload, present once labeling succeeded.
    pub labels_position: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl DocumentRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            session_id: row.get("session_id")?,
            original_name: row.get("original_name")?,
            status: row.get("status")?,
            verification: Verification {
                has_qr: row.get("has_qr")?,
                has_stamp: row.get("has_stamp")?,
                has_signature: row.get("has_signature")?,
            },
            labels_position: row.get("labels_position")?,
            error: row.get("error")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Filter parameters for listing a session's documents.
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub status: Option<DocumentStatus>,
    pub order: SortOrder,
}

pub(crate) fn insert_in(
    conn: &Connection,
    session_id: i64,
    original_name: &str,
    now: &str,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO session_documents (session_id, original_name, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![session_id, original_name, DocumentStatus::Pending, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn load(conn: &Connection, id: i64) -> Result<Option<DocumentRow>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT * FROM session_documents WHERE id = ?1",
            params![id],
            DocumentRow::from_row,
        )
        .optional()?)
}

/// Inserts a new PENDING document for an existing session.
pub fn insert(
    db: &Database,
    session_id: i64,
    original_name: &str,
) -> Result<DocumentRow, DatabaseError> {
    db.with_conn(|conn| {
        let id = insert_in(conn, session_id, original_name, &now_timestamp())?;
        load(conn, id)?.ok_or(DatabaseError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    })
}

/// Finds a document by its ID.
pub fn find_by_id(db: &Database, id: i64) -> Result<Option<DocumentRow>, DatabaseError> {
    db.with_conn(|conn| load(conn, id))
}

/// Lists the documents of one session.
pub fn list_for_session(
    db: &Database,
    session_id: i64,
    filter: &DocumentFilter,
) -> Result<Vec<DocumentRow>, DatabaseError> {
    db.with_conn(|conn| {
        let order = match filter.order {
            SortOrder::NewestFirst => "created_at DESC, id DESC",
            SortOrder::OldestFirst => "created_at ASC, id ASC",
        };
        let rows = match filter.status {
            Some(status) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT * FROM session_documents WHERE session_id = ?1 AND status = ?2 ORDER BY {order}"
                ))?;
                let rows = stmt
                    .query_map(params![session_id, status], DocumentRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT * FROM session_documents WHERE session_id = ?1 ORDER BY {order}"
                ))?;
                let rows = stmt
                    .query_map(params![session_id], DocumentRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(rows)
    })
}

/// Records a finished labeling run. Only a PENDING document transitions;
/// returns whether the row changed.
pub fn mark_successful(
    db: &Database,
    id: i64,
    verification: Verification,
    labels_position: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE session_documents
             SET status = ?2, has_qr = ?3, has_stamp = ?4, has_signature = ?5,
                 labels_position = ?6, error = NULL, updated_at = ?7
             WHERE id = ?1 AND status = 'PENDING'",
            params![
                id,
                DocumentStatus::Successful,
                verification.has_qr,
                verification.has_stamp,
                verification.has_signature,
                labels_position,
                now_timestamp(),
            ],
        )?;
        Ok(changed > 0)
    })
}

/// Records a failed labeling run. Only a PENDING document transitions.
pub fn mark_failed(db: &Database, id: i64, error: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE session_documents SET status = ?2, error = ?3, updated_at = ?4
             WHERE id = ?1 AND status = 'PENDING'",
            params![id, DocumentStatus::Failed, error, now_timestamp()],
        )?;
        Ok(changed > 0)
    })
}
