//! Analysis repository: operations on the `document_analyses` table.
//!
//! There is at most one analysis record per document. Starting a new run
//! resets a terminal record back to PROCESSING; a record that is already
//! PROCESSING is never restarted.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{now_timestamp, Database, DatabaseError};
use crate::models::{AnalysisResults, AnalysisStatus};

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRow {
    pub id: String,
    pub document_id: i64,
    pub status: AnalysisStatus,
    pub fraud_sentences: Vec<String>,
    pub mistake_words: Vec<String>,
    pub document_type: Option<String>,
    pub document_summary: Option<String>,
    pub document_text: Option<String>,
    pub error_log: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl AnalysisRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            document_id: row.get("document_id")?,
            status: row.get("status")?,
            fraud_sentences: json_list(row, "fraud_sentences")?,
            mistake_words: json_list(row, "mistake_words")?,
            document_type: row.get("document_type")?,
            document_summary: row.get("document_summary")?,
            document_text: row.get("document_text")?,
            error_log: row.get("error_log")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn results(&self) -> AnalysisResults {
        AnalysisResults {
            fraud_sentences: self.fraud_sentences.clone(),
            mistake_words: self.mistake_words.clone(),
            document_type: self.document_type.clone(),
            document_summary: self.document_summary.clone(),
        }
    }
}

fn json_list(row: &Row<'_>, column: &str) -> Result<Vec<String>, rusqlite::Error> {
    let raw: String = row.get(column)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn encode_list(column: &'static str, items: &[String]) -> Result<String, DatabaseError> {
    serde_json::to_string(items).map_err(|source| DatabaseError::Encode { column, source })
}

/// Result of trying to start an analysis run.
#[derive(Debug, Clone, PartialEq)]
pub enum BeginOutcome {
    Started(AnalysisRow),
    AlreadyRunning(AnalysisRow),
}

/// Starts an analysis run for a document.
///
/// Creates the record or resets a COMPLETED/FAILED one to PROCESSING with
/// its previous results cleared.
pub fn begin(db: &Database, document_id: i64) -> Result<BeginOutcome, DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        let now = now_timestamp();

        if let Some(existing) = load_by_document(&tx, document_id)? {
            if existing.status == AnalysisStatus::Processing {
                return Ok(BeginOutcome::AlreadyRunning(existing));
            }
            tx.execute(
                "UPDATE document_analyses
                 SET status = ?2, fraud_sentences = '[]', mistake_words = '[]',
                     document_type = NULL, document_summary = NULL, document_text = NULL,
                     error_log = NULL, updated_at = ?3
                 WHERE id = ?1",
                params![existing.id, AnalysisStatus::Processing, now],
            )?;
        } else {
            tx.execute(
                "INSERT INTO document_analyses (id, document_id, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![
                    uuid::Uuid::new_v4().to_string(),
                    document_id,
                    AnalysisStatus::Processing,
                    now
                ],
            )?;
        }

        let row = load_by_document(&tx, document_id)?
            .ok_or(DatabaseError::Sqlite(rusqlite::Error::QueryReturnedNoRows))?;
        tx.commit()?;
        Ok(BeginOutcome::Started(row))
    })
}

/// Stores the results of a run. Only a PROCESSING record transitions.
pub fn complete(
    db: &Database,
    id: &str,
    results: &AnalysisResults,
    document_text: &str,
) -> Result<bool, DatabaseError> {
    let fraud = encode_list("fraud_sentences", &results.fraud_sentences)?;
    let mistakes = encode_list("mistake_words", &results.mistake_words)?;
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE document_analyses
             SET status = ?2, fraud_sentences = ?3, mistake_words = ?4, document_type = ?5,
                 document_summary = ?6, document_text = ?7, error_log = NULL, updated_at = ?8
             WHERE id = ?1 AND status = 'PROCESSING'",
            params![
                id,
                AnalysisStatus::Completed,
                fraud,
                mistakes,
                results.document_type,
                results.document_summary,
                document_text,
                now_timestamp(),
            ],
        )?;
        Ok(changed > 0)
    })
}

/// Marks a run as failed. Only a PROCESSING record transitions.
pub fn fail(db: &Database, id: &str, error_log: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE document_analyses SET status = ?2, error_log = ?3, updated_at = ?4
             WHERE id = ?1 AND status = 'PROCESSING'",
            params![id, AnalysisStatus::Failed, error_log, now_timestamp()],
        )?;
        Ok(changed > 0)
    })
}

/// Finds the analysis record of a document.
pub fn find_by_document(db: &Database, document_id: i64) -> Result<Option<AnalysisRow>, DatabaseError> {
    db.with_conn(|conn| load_by_document(conn, document_id))
}

fn load_by_document(conn: &Connection, document_id: i64) -> Result<Option<AnalysisRow>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT * FROM document_analyses WHERE document_id = ?1",
            params![document_id],
            AnalysisRow::from_row,
        )
        .optional()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{document_repo, session_repo};

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn sample_document(db: &Database) -> i64 {
        let session = session_repo::insert(db, 1).unwrap();
        document_repo::insert(db, session.id, "doc.pdf").unwrap().id
    }

    fn sample_results() -> AnalysisResults {
        AnalysisResults {
            fraud_sentences: vec!["Оплата наличными без чека".into()],
            mistake_words: vec!["завут".into()],
            document_type: Some("Договор".into()),
            document_summary: None,
        }
    }

    fn started(outcome: BeginOutcome) -> AnalysisRow {
        match outcome {
            BeginOutcome::Started(row) => row,
            other => panic!("expected a started run, got {:?}", other),
        }
    }

    #[test]
    fn test_begin_creates_processing_record() {
        let db = test_db();
        let doc = sample_document(&db);
        let row = started(begin(&db, doc).unwrap());
        assert_eq!(row.status, AnalysisStatus::Processing);
        assert_eq!(row.document_id, doc);
        assert!(row.fraud_sentences.is_empty());
    }

    #[test]
    fn test_begin_refuses_concurrent_run() {
        let db = test_db();
        let doc = sample_document(&db);
        let first = started(begin(&db, doc).unwrap());
        match begin(&db, doc).unwrap() {
            BeginOutcome::AlreadyRunning(row) => assert_eq!(row.id, first.id),
            other => panic!("expected AlreadyRunning, got {:?}", other),
        }
    }

    #[test]
    fn test_complete_stores_results() {
        let db = test_db();
        let doc = sample_document(&db);
        let row = started(begin(&db, doc).unwrap());

        assert!(complete(&db, &row.id, &sample_results(), "--- Page: page_1.png ---\nтекст").unwrap());
        let stored = find_by_document(&db, doc).unwrap().unwrap();
        assert_eq!(stored.status, AnalysisStatus::Completed);
        assert_eq!(stored.results(), sample_results());
        assert!(stored.document_text.unwrap().contains("текст"));

        // A completed record cannot be failed afterwards.
        assert!(!fail(&db, &row.id, "late").unwrap());
    }

    #[test]
    fn test_restart_after_failure_clears_previous_run() {
        let db = test_db();
        let doc = sample_document(&db);
        let row = started(begin(&db, doc).unwrap());
        assert!(fail(&db, &row.id, "Failed to download images: nothing stored").unwrap());

        let failed = find_by_document(&db, doc).unwrap().unwrap();
        assert_eq!(failed.status, AnalysisStatus::Failed);
        assert!(failed.error_log.is_some());

        let restarted = started(begin(&db, doc).unwrap());
        assert_eq!(restarted.id, row.id);
        assert_eq!(restarted.status, AnalysisStatus::Processing);
        assert!(restarted.error_log.is_none());
    }

    #[test]
    fn test_find_missing_analysis() {
        let db = test_db();
        let doc = sample_document(&db);
        assert!(find_by_document(&db, doc).unwrap().is_none());
    }
}
