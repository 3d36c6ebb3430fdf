//! Session lifecycle: upload fan-out, listing, lookup and deletion.

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::analysis::DocumentAnalyzer;
use crate::config::DEFAULT_MAX_UPLOAD_BYTES;
use crate::db::document_repo::{self, DocumentFilter, DocumentRow, SortOrder};
use crate::db::session_repo::{self, SessionRow};
use crate::db::{Database, DatabaseError};
use crate::dto::{self, SessionDocumentDetailsDto, SessionDocumentDto, SessionDto};
use crate::error::ProcessError;
use crate::labels::{self, LabelsMap};
use crate::models::{DocumentStatus, SessionStatus};
use crate::pipeline::{DocumentJob, LabelingPipeline, TracingProgress};
use crate::processor::{collect_pdfs, UploadedFile};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No files provided")]
    NoFiles,

    #[error("No PDFs found in upload")]
    NoPdfs,

    #[error("Invalid upload: {0}")]
    Archive(#[from] ProcessError),

    #[error("Session not found: {0}")]
    SessionNotFound(i64),

    #[error("Document {document_id} not found in session {session_id}")]
    DocumentNotFound { session_id: i64, document_id: i64 },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// A freshly created session and the background tasks labeling its documents.
pub struct CreatedSession {
    pub session: SessionDto,
    pub documents: Vec<SessionDocumentDto>,
    /// Dropping these detaches the tasks; they keep running.
    pub tasks: Vec<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct SessionService {
    db: Database,
    pipeline: Arc<LabelingPipeline>,
    analyzer: DocumentAnalyzer,
    auto_analyze: bool,
    max_extracted_bytes: u64,
}

impl SessionService {
    pub fn new(
        db: Database,
        pipeline: Arc<LabelingPipeline>,
        analyzer: DocumentAnalyzer,
        auto_analyze: bool,
    ) -> Self {
        Self {
            db,
            pipeline,
            analyzer,
            auto_analyze,
            max_extracted_bytes: DEFAULT_MAX_UPLOAD_BYTES as u64,
        }
    }

    /// Caps the total bytes a single upload may unpack from ZIP archives.
    pub fn with_extraction_limit(mut self, bytes: u64) -> Self {
        self.max_extracted_bytes = bytes;
        self
    }

    /// Creates a session from uploaded files and starts one labeling task per PDF.
    ///
    /// Archives are unpacked on the blocking pool.
    pub async fn create(&self, files: Vec<UploadedFile>) -> Result<CreatedSession, SessionError> {
        if files.is_empty() {
            return Err(SessionError::NoFiles);
        }
        let limit = self.max_extracted_bytes;
        let pdfs = tokio::task::spawn_blocking(move || collect_pdfs(files, limit))
            .await
            .map_err(|e| SessionError::Task(e.to_string()))??;
        if pdfs.is_empty() {
            return Err(SessionError::NoPdfs);
        }

        let names: Vec<String> = pdfs.iter().map(|p| p.name.clone()).collect();
        let (session, documents) = session_repo::create_with_documents(&self.db, &names)?;
        tracing::info!(session_id = session.id, documents = documents.len(), "session created");

        let tasks = documents
            .iter()
            .zip(pdfs)
            .map(|(doc, pdf)| {
                self.spawn_document(DocumentJob {
                    session_id: session.id,
                    document_id: doc.id,
                    original_name: doc.original_name.clone(),
                    pdf: pdf.bytes,
                })
            })
            .collect();

        Ok(CreatedSession {
            session: SessionDto::from(&session),
            documents: documents.iter().map(SessionDocumentDto::from_row).collect(),
            tasks,
        })
    }

    fn spawn_document(&self, job: DocumentJob) -> JoinHandle<()> {
        let pipeline = self.pipeline.clone();
        let analyzer = self.analyzer.clone();
        let auto_analyze = self.auto_analyze;
        let span = tracing::info_span!("document_task", document_id = job.document_id);

        tokio::spawn(
            async move {
                let document_id = job.document_id;
                match pipeline.process(job, &TracingProgress).await {
                    Ok(_) if auto_analyze => {
                        let raw_id = document_id.to_string();
                        match analyzer.start(&raw_id, &[]) {
                            Ok(analysis) => {
                                if let Err(e) = analyzer.run(analysis).await {
                                    tracing::warn!(error = %e, "automatic analysis failed");
                                }
                            }
                            Err(e) => tracing::warn!(error = %e, "could not start analysis"),
                        }
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "document processing failed"),
                }
            }
            .instrument(span),
        )
    }

    pub fn get(&self, session_id: i64) -> Result<SessionDto, SessionError> {
        Ok(SessionDto::from(&self.find(session_id)?))
    }

    pub fn list(&self, status: Option<SessionStatus>) -> Result<Vec<SessionDto>, SessionError> {
        Ok(session_repo::list(&self.db, status)?
            .iter()
            .map(SessionDto::from)
            .collect())
    }

    /// Documents of a session, newest first.
    pub fn documents(
        &self,
        session_id: i64,
        status: Option<DocumentStatus>,
    ) -> Result<Vec<SessionDocumentDto>, SessionError> {
        self.find(session_id)?;
        let filter = DocumentFilter {
            status,
            order: SortOrder::NewestFirst,
        };
        Ok(document_repo::list_for_session(&self.db, session_id, &filter)?
            .iter()
            .map(SessionDocumentDto::from_row)
            .collect())
    }

    /// A single document, which must belong to `session_id`.
    pub fn document(
        &self,
        session_id: i64,
        document_id: i64,
    ) -> Result<SessionDocumentDetailsDto, SessionError> {
        let row = self.find_document(session_id, document_id)?;
        Ok(SessionDocumentDetailsDto::from_row(&row))
    }

    /// Labels of every labeled document in the session, keyed by file name.
    pub fn labels_map(&self, session_id: i64) -> Result<LabelsMap, SessionError> {
        self.find(session_id)?;
        let filter = DocumentFilter {
            status: None,
            order: SortOrder::OldestFirst,
        };
        let rows = document_repo::list_for_session(&self.db, session_id, &filter)?;
        let decoded: Vec<_> = rows
            .iter()
            .filter_map(|row| dto::decode_labels(row).map(|l| (row.original_name.as_str(), l)))
            .collect();
        Ok(labels::labels_map(
            decoded.iter().map(|(name, labels)| (*name, labels)),
        ))
    }

    pub fn delete(&self, session_id: i64) -> Result<(), SessionError> {
        if session_repo::delete(&self.db, session_id)? {
            tracing::info!(session_id, "session deleted");
            Ok(())
        } else {
            Err(SessionError::SessionNotFound(session_id))
        }
    }

    fn find(&self, session_id: i64) -> Result<SessionRow, SessionError> {
        session_repo::find_by_id(&self.db, session_id)?
            .ok_or(SessionError::SessionNotFound(session_id))
    }

    fn find_document(&self, session_id: i64, document_id: i64) -> Result<DocumentRow, SessionError> {
        document_repo::find_by_id(&self.db, document_id)?
            .filter(|row| row.session_id == session_id)
            .ok_or(SessionError::DocumentNotFound {
                session_id,
                document_id,
            })
    }
}
