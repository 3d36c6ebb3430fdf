use thiserror::Error;

use docverify::client::{ClientError, PollError};
use docverify::{ConfigError, DocVerifyError};

#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Service(#[from] DocVerifyError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Polling stopped: {0}")]
    Poll(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<PollError<ClientError>> for ServerError {
    fn from(err: PollError<ClientError>) -> Self {
        match err {
            PollError::Fetch(e) => ServerError::Client(e),
            other => ServerError::Poll(other.to_string()),
        }
    }
}
