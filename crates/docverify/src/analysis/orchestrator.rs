use std::sync::Arc;

use tracing::Instrument;

use super::{parse, prompts, AnalysisError, AnalysisStatusView, AnalysisTask};
use crate::collaborators::{Collaborators, LlmClient, OcrClient};
use crate::db::analysis_repo::{self, BeginOutcome};
use crate::db::{document_repo, Database};
use crate::models::AnalysisResults;
use crate::storage::{self, DocumentStorage, PageImage};

/// A started run, holding the PROCESSING record it will finish.
#[derive(Debug, Clone)]
pub struct AnalysisJob {
    pub analysis_id: String,
    pub document_id: i64,
    pub session_id: i64,
    pub tasks: Vec<AnalysisTask>,
}

/// Drives OCR and the LLM passes for a document and records the outcome.
#[derive(Clone)]
pub struct DocumentAnalyzer {
    db: Database,
    storage: DocumentStorage,
    ocr: Arc<dyn OcrClient>,
    llm: Arc<dyn LlmClient>,
}

impl DocumentAnalyzer {
    pub fn new(db: Database, storage: DocumentStorage, collaborators: &Collaborators) -> Self {
        Self {
            db,
            storage,
            ocr: collaborators.ocr.clone(),
            llm: collaborators.llm.clone(),
        }
    }

    /// Validates the id and moves the document's analysis to PROCESSING.
    ///
    /// Nothing is recorded for invalid ids or unknown documents.
    pub fn start(&self, raw_id: &str, tasks: &[AnalysisTask]) -> Result<AnalysisJob, AnalysisError> {
        let document_id = super::parse_document_id(raw_id)?;
        let document = document_repo::find_by_id(&self.db, document_id)?
            .ok_or(AnalysisError::DocumentNotFound(document_id))?;

        match analysis_repo::begin(&self.db, document_id)? {
            BeginOutcome::Started(row) => {
                tracing::info!(document_id, analysis_id = %row.id, "analysis started");
                Ok(AnalysisJob {
                    analysis_id: row.id,
                    document_id,
                    session_id: document.session_id,
                    tasks: AnalysisTask::normalize(tasks),
                })
            }
            BeginOutcome::AlreadyRunning(_) => Err(AnalysisError::AlreadyRunning(document_id)),
        }
    }

    /// Runs a started job to completion. Every failure is recorded on the
    /// analysis record before it is returned.
    pub async fn run(&self, job: AnalysisJob) -> Result<AnalysisResults, AnalysisError> {
        let span = tracing::info_span!(
            "analysis",
            document_id = job.document_id,
            analysis_id = %job.analysis_id,
        );
        async {
            match self.execute(&job).await {
                Ok((results, text)) => {
                    if !analysis_repo::complete(&self.db, &job.analysis_id, &results, &text)? {
                        tracing::warn!("analysis record left PROCESSING before completion");
                    }
                    tracing::info!(
                        fraud = results.fraud_sentences.len(),
                        mistakes = results.mistake_words.len(),
                        "analysis completed"
                    );
                    Ok(results)
                }
                Err(err) => {
                    let log = err.to_string();
                    tracing::warn!(error = %log, "analysis failed");
                    analysis_repo::fail(&self.db, &job.analysis_id, &log)?;
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Starts and runs an analysis in the caller's task.
    pub async fn analyze(
        &self,
        raw_id: &str,
        tasks: &[AnalysisTask],
    ) -> Result<AnalysisResults, AnalysisError> {
        let job = self.start(raw_id, tasks)?;
        self.run(job).await
    }

    pub fn status(&self, raw_id: &str) -> Result<AnalysisStatusView, AnalysisError> {
        let document_id = super::parse_document_id(raw_id)?;
        Ok(match analysis_repo::find_by_document(&self.db, document_id)? {
            Some(row) => AnalysisStatusView::from_row(&row),
            None => AnalysisStatusView::not_found(document_id),
        })
    }

    async fn execute(&self, job: &AnalysisJob) -> Result<(AnalysisResults, String), AnalysisError> {
        let document_key = storage::document_key(job.session_id, job.document_id);
        let pages = self
            .storage
            .list_page_images(&document_key)
            .instrument(tracing::info_span!("fetch_images"))
            .await
            .map_err(AnalysisError::Download)?;

        let text = self
            .extract_text(&pages)
            .instrument(tracing::info_span!("ocr", pages = pages.len()))
            .await?;

        let mut results = AnalysisResults::default();
        for task in &job.tasks {
            let reply = self
                .llm
                .chat(&prompts::request_for(*task, &text))
                .instrument(tracing::info_span!("llm_task", task = task.as_str()))
                .await
                .map_err(|source| AnalysisError::Llm {
                    task: task.as_str(),
                    source,
                })?;
            match task {
                AnalysisTask::Fraud => results.fraud_sentences = parse::parse_list(&reply.text),
                AnalysisTask::Spelling => results.mistake_words = parse::parse_list(&reply.text),
                AnalysisTask::Classification => {
                    results.document_type = Some(parse::parse_document_type(&reply.text))
                }
                AnalysisTask::Summary => results.document_summary = parse::parse_summary(&reply.text),
            }
        }
        Ok((results, text))
    }

    /// OCRs every page and joins the non-empty texts with page headers.
    async fn extract_text(&self, pages: &[PageImage]) -> Result<String, AnalysisError> {
        let mut sections = Vec::with_capacity(pages.len());
        for page in pages {
            let ocr = self
                .ocr
                .extract_text(&page.filename, &page.bytes)
                .await
                .map_err(AnalysisError::Ocr)?;
            let text = ocr.text.trim();
            if text.is_empty() {
                tracing::debug!(filename = %page.filename, "page produced no text");
                continue;
            }
            sections.push(format!("--- Page: {} ---\n{}", page.filename, text));
        }
        if sections.is_empty() {
            return Err(AnalysisError::EmptyText);
        }
        Ok(sections.join("\n\n"))
    }
}
