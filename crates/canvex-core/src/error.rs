use thiserror::Error;

#[derive(Debug, Error)]
pub enum CanvexError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid session id: {0:?}")]
    InvalidSession(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Codec error at entry {index}: {message}")]
    Codec { index: usize, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Surface error: {0}")]
    Surface(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CanvexError>;
