pub mod analysis;
pub mod app;
pub mod chat;
pub mod client;
pub mod collaborators;
pub mod config;
pub mod db;
pub mod dto;
pub mod error;
pub mod labels;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod processor;
pub mod sessions;
pub mod storage;

#[cfg(test)]
mod testing;

pub use analysis::{AnalysisError, AnalysisStatusView, AnalysisTask, DocumentAnalyzer};
pub use app::AppContext;
pub use chat::{ChatAnswer, ChatError, ChatService};
pub use client::{ApiClient, ClientError, SessionProgress};
pub use collaborators::{Collaborators, Detection, DetectionCategory};
pub use config::Settings;
pub use db::{Database, DatabaseError};
pub use error::{
    CollaboratorError, ConfigError, DocVerifyError, ProcessError, Result, StorageError,
};
pub use labels::{CategoryFilter, LabelsPosition};
pub use models::{AnalysisStatus, DocumentStatus, SessionStatus, Verification};
pub use pipeline::{LabelingPipeline, PipelineConfig};
pub use sessions::{SessionError, SessionService};
pub use storage::DocumentStorage;
