//! Wiring of the services from loaded settings.

use std::sync::Arc;

use crate::analysis::DocumentAnalyzer;
use crate::chat::ChatService;
use crate::collaborators::Collaborators;
use crate::config::Settings;
use crate::db::Database;
use crate::error::Result;
use crate::pipeline::{LabelingPipeline, PipelineConfig};
use crate::processor::{PageRenderer, PdftoppmRenderer};
use crate::sessions::SessionService;
use crate::storage::{self, DocumentStorage};

/// Every long-lived service, shared by the HTTP handlers.
#[derive(Clone)]
pub struct AppContext {
    pub db: Database,
    pub storage: DocumentStorage,
    pub sessions: SessionService,
    pub analyzer: DocumentAnalyzer,
    pub chat: ChatService,
}

impl AppContext {
    /// Opens the database, connects storage and builds the collaborator clients.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let db = Database::open(&settings.database_path)?;
        let storage = storage::build_store(&settings.storage)?;
        let collaborators = Collaborators::from_settings(&settings.collaborators)?;
        tracing::info!(
            database = %settings.database_path.display(),
            stub = settings.collaborators.use_stub,
            "services configured"
        );
        Ok(Self::assemble(
            db,
            storage,
            collaborators,
            Arc::new(PdftoppmRenderer),
            settings,
        ))
    }

    /// Builds the services around already constructed backends.
    pub fn assemble(
        db: Database,
        storage: DocumentStorage,
        collaborators: Collaborators,
        renderer: Arc<dyn PageRenderer>,
        settings: &Settings,
    ) -> Self {
        let pipeline = LabelingPipeline::new(
            db.clone(),
            storage.clone(),
            collaborators.detector.clone(),
            renderer,
            PipelineConfig::from(&settings.processing),
        );
        let analyzer = DocumentAnalyzer::new(db.clone(), storage.clone(), &collaborators);
        let sessions = SessionService::new(
            db.clone(),
            Arc::new(pipeline),
            analyzer.clone(),
            settings.processing.auto_analyze,
        )
        .with_extraction_limit(settings.server.max_upload_bytes as u64);
        let chat = ChatService::new(
            db.clone(),
            collaborators.llm.clone(),
            settings.collaborators.use_stub,
        );
        Self {
            db,
            storage,
            sessions,
            analyzer,
            chat,
        }
    }
}
