use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocVerifyError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .names.join(", "))]
    Missing { names: Vec<String> },

    #[error("Invalid value '{value}' for {name}: {reason}")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to process PDF: {0}")]
    PdfProcessing(String),

    #[error("PDF has no pages")]
    EmptyDocument,

    #[error("Failed to process image: {0}")]
    ImageProcessing(String),

    #[error("Invalid ZIP archive '{name}': {reason}")]
    Archive { name: String, reason: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object store error: {0}")]
    Backend(#[source] object_store::Error),

    #[error("Invalid storage configuration: {0}")]
    Configuration(String),
}

impl From<object_store::Error> for StorageError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => StorageError::NotFound(path),
            other => StorageError::Backend(other),
        }
    }
}

/// Failure talking to one of the remote collaborators (OCR, detector, LLM).
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("{service} endpoint unreachable: {source}")]
    Unreachable {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} rejected the credentials")]
    Unauthorized { service: &'static str },

    #[error("{service} error (HTTP {status}): {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} returned an invalid response: {reason}")]
    InvalidResponse {
        service: &'static str,
        reason: String,
    },

    #[error("{service} endpoint is not configured")]
    NotConfigured { service: &'static str },

    #[error("Failed to build {service} client: {source}")]
    ClientBuild {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

pub type Result<T> = std::result::Result<T, DocVerifyError>;
