use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Document processing failed: {0}")]
    Processing(#[from] crate::error::ProcessError),

    #[error("Storage failed: {0}")]
    Storage(#[from] crate::error::StorageError),

    #[error("Detection failed: {0}")]
    Detection(#[from] crate::error::CollaboratorError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Failed to encode labels: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}
