//! Question answering over a single analyzed document.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::{self, AnalysisError};
use crate::collaborators::{ChatRequest, LlmClient};
use crate::db::{analysis_repo, document_repo, Database, DatabaseError};
use crate::error::CollaboratorError;
use crate::models::AnalysisStatus;

const MAX_TOKENS: u32 = 1024;
const TEMPERATURE: f32 = 0.4;
const MAX_FRAUD_SENTENCES: usize = 10;
const MAX_MISTAKE_WORDS: usize = 50;
const NO_ANSWER: &str = "(No answer returned)";

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Invalid document id: {0}")]
    InvalidDocumentId(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(i64),

    #[error("Message must not be empty")]
    EmptyMessage,

    #[error("LLM request failed: {0}")]
    Llm(#[from] CollaboratorError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// What the assistant knows about the document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatContext {
    pub document_type: Option<String>,
    pub document_summary: Option<String>,
    pub fraud_sentences: Vec<String>,
    pub mistake_words: Vec<String>,
    pub has_stamp: bool,
    pub has_signature: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatAnswer {
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Clone)]
pub struct ChatService {
    db: Database,
    llm: Arc<dyn LlmClient>,
    stub: bool,
}

impl ChatService {
    pub fn new(db: Database, llm: Arc<dyn LlmClient>, stub: bool) -> Self {
        Self { db, llm, stub }
    }

    pub async fn answer(
        &self,
        raw_id: &str,
        message: &str,
        accept_language: Option<&str>,
    ) -> Result<ChatAnswer, ChatError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let ctx = self.load_context(raw_id)?;

        if self.stub {
            return Ok(ChatAnswer {
                answer: stub_answer(&ctx, message),
                model: Some("stub".to_string()),
            });
        }

        let system_prompt = build_system_prompt(&ctx, primary_language(accept_language).as_deref());
        let prompt = format!("{system_prompt}\n\nUser question: {message}");
        let reply = self
            .llm
            .chat(&ChatRequest::new(prompt, MAX_TOKENS, TEMPERATURE))
            .await?;

        let answer = reply.text.trim();
        Ok(ChatAnswer {
            answer: if answer.is_empty() {
                NO_ANSWER.to_string()
            } else {
                answer.to_string()
            },
            model: reply.model,
        })
    }

    /// Verification flags always; analysis results only from a completed run.
    pub fn load_context(&self, raw_id: &str) -> Result<ChatContext, ChatError> {
        let document_id = analysis::parse_document_id(raw_id).map_err(|e| match e {
            AnalysisError::InvalidDocumentId(raw) => ChatError::InvalidDocumentId(raw),
            other => ChatError::InvalidDocumentId(other.to_string()),
        })?;
        let document = document_repo::find_by_id(&self.db, document_id)?
            .ok_or(ChatError::DocumentNotFound(document_id))?;

        let mut ctx = ChatContext {
            has_stamp: document.verification.has_stamp,
            has_signature: document.verification.has_signature,
            ..ChatContext::default()
        };
        if let Some(analysis) = analysis_repo::find_by_document(&self.db, document_id)? {
            if analysis.status == AnalysisStatus::Completed {
                ctx.document_type = analysis.document_type;
                ctx.document_summary = analysis.document_summary;
                ctx.fraud_sentences = analysis.fraud_sentences;
                ctx.mistake_words = analysis.mistake_words;
            }
        }
        Ok(ctx)
    }
}

/// Primary language tag of an `Accept-Language` header, without region.
pub fn primary_language(header: Option<&str>) -> Option<String> {
    let first = header?.split(',').next()?.split(';').next()?.trim();
    if first.is_empty() || first == "*" {
        return None;
    }
    first.split('-').next().map(str::to_lowercase)
}

pub fn build_system_prompt(ctx: &ChatContext, language: Option<&str>) -> String {
    let mut lines = vec!["You are an expert assistant helping with document review.".to_string()];
    if let Some(lang) = language {
        lines.push(format!("Respond in language: {lang}."));
    }
    if let Some(kind) = ctx.document_type.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("Document type: {kind}."));
    }
    if let Some(summary) = ctx.document_summary.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        lines.push("Document summary:".to_string());
        lines.push(summary.to_string());
    }
    lines.push("Verification signals:".to_string());
    lines.push(format!(" - Signature present: {}", yes_no(ctx.has_signature)));
    lines.push(format!(" - Stamp present: {}", yes_no(ctx.has_stamp)));
    if !ctx.fraud_sentences.is_empty() {
        lines.push("Potential fraud sentences:".to_string());
        lines.extend(
            ctx.fraud_sentences
                .iter()
                .take(MAX_FRAUD_SENTENCES)
                .map(|s| format!(" - {s}")),
        );
    }
    if !ctx.mistake_words.is_empty() {
        lines.push("Detected misspelled words:".to_string());
        let words: Vec<&str> = ctx
            .mistake_words
            .iter()
            .take(MAX_MISTAKE_WORDS)
            .map(String::as_str)
            .collect();
        lines.push(words.join(", "));
    }
    lines.push(
        "Use the above context to answer user questions, explain risks, suggest corrections, \
         and provide concise, actionable guidance."
            .to_string(),
    );
    lines.push("Answers should be clear and to the point. Maximum 200 characters.".to_string());
    lines.join("\n")
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn stub_answer(ctx: &ChatContext, message: &str) -> String {
    let kind = ctx
        .document_type
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or("document");
    let echoed: String = message.chars().take(200).collect();
    format!(
        "(stub) {kind} | sig={} stamp={} -> {echoed}",
        ctx.has_signature, ctx.has_stamp
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::session_repo;
    use crate::models::{AnalysisResults, Verification};
    use crate::testing::ScriptedLlm;

    fn seeded() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let (_, docs) = session_repo::create_with_documents(&db, &["a.pdf".to_string()]).unwrap();
        let id = docs[0].id;
        document_repo::mark_successful(
            &db,
            id,
            Verification {
                has_qr: false,
                has_stamp: true,
                has_signature: false,
            },
            "{}",
        )
        .unwrap();
        (db, id)
    }

    fn complete_analysis(db: &Database, document_id: i64) {
        let row = match analysis_repo::begin(db, document_id).unwrap() {
            analysis_repo::BeginOutcome::Started(row) => row,
            other => panic!("unexpected {other:?}"),
        };
        let results = AnalysisResults {
            fraud_sentences: (1..=12).map(|i| format!("fraud {i}")).collect(),
            mistake_words: vec!["Ппривет".into(), "завут".into()],
            document_type: Some("Договор".into()),
            document_summary: Some("Поставка оборудования".into()),
        };
        analysis_repo::complete(db, &row.id, &results, "text").unwrap();
    }

    #[test]
    fn test_primary_language() {
        assert_eq!(primary_language(Some("ru,en;q=0.9")).as_deref(), Some("ru"));
        assert_eq!(primary_language(Some("en-US,en;q=0.5")).as_deref(), Some("en"));
        assert_eq!(primary_language(Some("de;q=0.8")).as_deref(), Some("de"));
        assert_eq!(primary_language(Some("")), None);
        assert_eq!(primary_language(Some("*")), None);
        assert_eq!(primary_language(None), None);
    }

    #[test]
    fn test_system_prompt_without_analysis() {
        let ctx = ChatContext {
            has_signature: true,
            ..ChatContext::default()
        };
        let prompt = build_system_prompt(&ctx, None);
        assert!(prompt.starts_with("You are an expert assistant"));
        assert!(!prompt.contains("Respond in language"));
        assert!(!prompt.contains("Document type"));
        assert!(!prompt.contains("Document summary"));
        assert!(prompt.contains(" - Signature present: yes"));
        assert!(prompt.contains(" - Stamp present: no"));
        assert!(prompt.ends_with("Maximum 200 characters."));
    }

    #[test]
    fn test_context_limits_lists() {
        let (db, id) = seeded();
        complete_analysis(&db, id);
        let service = ChatService::new(db, Arc::new(ScriptedLlm::new()), false);
        let ctx = service.load_context(&id.to_string()).unwrap();
        let prompt = build_system_prompt(&ctx, Some("ru"));
        assert!(prompt.contains("Respond in language: ru."));
        assert!(prompt.contains("Document type: Договор."));
        assert!(prompt.contains(" - fraud 10"));
        assert!(!prompt.contains(" - fraud 11"));
        assert!(prompt.contains("Ппривет, завут"));
    }

    #[tokio::test]
    async fn test_answer_forwards_prompt_and_trims() {
        let (db, id) = seeded();
        let llm = Arc::new(ScriptedLlm::new());
        llm.respond_to("User question: Is it signed?", "  No signature was found.  ");
        let service = ChatService::new(db, llm.clone(), false);

        let answer = service
            .answer(&id.to_string(), " Is it signed? ", Some("en-US"))
            .await
            .unwrap();
        assert_eq!(answer.answer, "No signature was found.");
        assert_eq!(answer.model.as_deref(), Some("scripted"));
        assert!(llm.last_prompt().unwrap().contains("Respond in language: en."));
    }

    #[tokio::test]
    async fn test_empty_reply_and_errors() {
        let (db, id) = seeded();
        let service = ChatService::new(db, Arc::new(ScriptedLlm::new()), false);
        let answer = service.answer(&id.to_string(), "hi", None).await.unwrap();
        assert_eq!(answer.answer, NO_ANSWER);

        assert!(matches!(
            service.answer("abc", "hi", None).await,
            Err(ChatError::InvalidDocumentId(_))
        ));
        assert!(matches!(
            service.answer("999", "hi", None).await,
            Err(ChatError::DocumentNotFound(999))
        ));
        assert!(matches!(
            service.answer(&id.to_string(), "   ", None).await,
            Err(ChatError::EmptyMessage)
        ));
    }

    #[tokio::test]
    async fn test_llm_failure_surfaces() {
        let (db, id) = seeded();
        let llm = Arc::new(ScriptedLlm::new());
        llm.fail_all();
        let service = ChatService::new(db, llm, false);
        let err = service.answer(&id.to_string(), "hi", None).await.unwrap_err();
        assert!(matches!(err, ChatError::Llm(CollaboratorError::Status { status: 503, .. })));
    }

    #[tokio::test]
    async fn test_stub_answer_format() {
        let (db, id) = seeded();
        complete_analysis(&db, id);
        let service = ChatService::new(db, Arc::new(ScriptedLlm::new()), true);
        let long = "x".repeat(300);
        let answer = service.answer(&id.to_string(), &long, None).await.unwrap();
        assert_eq!(
            answer.answer,
            format!("(stub) Договор | sig=false stamp=true -> {}", "x".repeat(200))
        );
        assert_eq!(answer.model.as_deref(), Some("stub"));
    }
}
